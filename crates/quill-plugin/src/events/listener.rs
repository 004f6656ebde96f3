//! Listener registrations and the shared listener table.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::RwLock;

use quill_core::events::{Event, EventPriority, WILDCARD};
use quill_core::result::AppResult;
use quill_core::types::{ListenerId, ObserverId};

/// Trait for event listener implementations.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Handles one event. Returning an error (or panicking) is reported as a
    /// `system:listener-error` event and never reaches the emitter.
    async fn on_event(&self, event: Arc<Event>) -> AppResult<()>;
}

/// Predicate deciding whether a listener's callback runs for an event.
pub type ListenerFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Options accepted by `add_event_listener`.
#[derive(Clone, Default)]
pub struct ListenerOptions {
    /// Higher runs first. Defaults to `EventPriority::NORMAL`.
    pub priority: EventPriority,
    /// Unregister after the first successful invocation.
    pub once: bool,
    /// Skip the callback (but stay registered) when this returns `false`.
    pub filter: Option<ListenerFilter>,
}

impl ListenerOptions {
    /// Default options: normal priority, persistent, unfiltered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the priority.
    pub fn priority(mut self, priority: impl Into<EventPriority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Marks the listener as single-shot.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Sets the filter predicate.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for ListenerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerOptions")
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("filter", &self.filter.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

/// One registered interest in an event type.
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) event: String,
    pub(crate) plugin_id: String,
    pub(crate) priority: EventPriority,
    pub(crate) once: bool,
    pub(crate) filter: Option<ListenerFilter>,
    pub(crate) callback: Arc<dyn EventListener>,
    /// Registration sequence number, used as the ordering tie-break.
    pub(crate) seq: u64,
    /// Set while a `once` listener is being invoked so concurrent
    /// emissions cannot run it twice.
    pub(crate) claimed: AtomicBool,
}

impl Listener {
    /// Claims a `once` listener for one invocation. Always succeeds for
    /// persistent listeners.
    pub(crate) fn try_claim(&self) -> bool {
        !self.once || !self.claimed.swap(true, Ordering::AcqRel)
    }

    /// Releases a claim after a failed invocation.
    pub(crate) fn release(&self) {
        if self.once {
            self.claimed.store(false, Ordering::Release);
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("plugin_id", &self.plugin_id)
            .field("priority", &self.priority)
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

/// Legacy synchronous observer registered through `on`/`once`.
pub(crate) struct Observer {
    pub(crate) id: ObserverId,
    pub(crate) once: bool,
    pub(crate) callback: Arc<dyn Fn(&Event) + Send + Sync>,
}

/// Listener map keyed by event type. The wildcard bucket is stored under
/// `"*"` and merged with the direct bucket at dispatch time.
#[derive(Default)]
pub(crate) struct ListenerTable {
    listeners: RwLock<HashMap<String, Vec<Arc<Listener>>>>,
    observers: RwLock<HashMap<String, Vec<Observer>>>,
    next_seq: AtomicU64,
}

impl ListenerTable {
    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) async fn insert(&self, listener: Listener) {
        let mut listeners = self.listeners.write().await;
        listeners
            .entry(listener.event.clone())
            .or_default()
            .push(Arc::new(listener));
    }

    pub(crate) async fn remove(&self, id: ListenerId) -> bool {
        self.remove_where(|l| l.id == id).await > 0
    }

    /// Removes `id` only if `plugin_id` registered it.
    pub(crate) async fn remove_owned(&self, id: ListenerId, plugin_id: &str) -> bool {
        self.remove_where(|l| l.id == id && l.plugin_id == plugin_id)
            .await
            > 0
    }

    pub(crate) async fn remove_plugin(&self, plugin_id: &str) -> usize {
        self.remove_where(|l| l.plugin_id == plugin_id).await
    }

    async fn remove_where(&self, matches: impl Fn(&Listener) -> bool) -> usize {
        let mut listeners = self.listeners.write().await;
        let mut removed = 0;

        for bucket in listeners.values_mut() {
            let before = bucket.len();
            bucket.retain(|l| !matches(l));
            removed += before - bucket.len();
        }
        listeners.retain(|_, bucket| !bucket.is_empty());

        removed
    }

    /// Returns the direct bucket for `event_type` merged with the wildcard
    /// bucket, sorted by descending priority then registration order.
    pub(crate) async fn resolve(&self, event_type: &str) -> Vec<Arc<Listener>> {
        let listeners = self.listeners.read().await;

        let mut resolved: Vec<Arc<Listener>> = listeners
            .get(event_type)
            .into_iter()
            .chain(listeners.get(WILDCARD))
            .flat_map(|bucket| bucket.iter().cloned())
            .collect();

        resolved.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        resolved
    }

    pub(crate) async fn count(&self, event: &str) -> usize {
        self.listeners.read().await.get(event).map_or(0, Vec::len)
    }

    pub(crate) async fn total(&self) -> usize {
        self.listeners.read().await.values().map(Vec::len).sum()
    }

    pub(crate) async fn plugin_count(&self, plugin_id: &str) -> usize {
        self.listeners
            .read()
            .await
            .values()
            .flat_map(|bucket| bucket.iter())
            .filter(|l| l.plugin_id == plugin_id)
            .count()
    }

    pub(crate) async fn add_observer(&self, event: &str, observer: Observer) {
        self.observers
            .write()
            .await
            .entry(event.to_string())
            .or_default()
            .push(observer);
    }

    pub(crate) async fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().await;
        let mut removed = false;

        for bucket in observers.values_mut() {
            let before = bucket.len();
            bucket.retain(|o| o.id != id);
            removed |= bucket.len() < before;
        }
        observers.retain(|_, bucket| !bucket.is_empty());

        removed
    }

    /// Takes a snapshot of the observers for `event_type`, removing the
    /// single-shot ones from the table.
    pub(crate) async fn take_observers(
        &self,
        event_type: &str,
    ) -> Vec<Arc<dyn Fn(&Event) + Send + Sync>> {
        let mut observers = self.observers.write().await;
        let Some(bucket) = observers.get_mut(event_type) else {
            return Vec::new();
        };

        let callbacks = bucket.iter().map(|o| o.callback.clone()).collect();
        bucket.retain(|o| !o.once);
        if bucket.is_empty() {
            observers.remove(event_type);
        }

        callbacks
    }
}

/// Handle returned by `add_event_listener`.
///
/// Dropping the handle does not unregister the listener; call
/// [`Subscription::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: ListenerId,
    event: String,
    table: Weak<ListenerTable>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, event: String, table: &Arc<ListenerTable>) -> Self {
        Self {
            id,
            event,
            table: Arc::downgrade(table),
        }
    }

    /// The listener id.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The event type the listener was registered for.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Unregisters the listener. Returns `false` if it was already gone.
    pub async fn unsubscribe(self) -> bool {
        match self.table.upgrade() {
            Some(table) => table.remove(self.id).await,
            None => false,
        }
    }
}

impl fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTable").finish_non_exhaustive()
    }
}
