//! Event manager: delivers events to every interested listener.
//!
//! Dispatch order is descending priority with registration order as the
//! tie-break. Listeners for one emission are started in that order and
//! awaited together: a slow listener does not delay the others from
//! starting, and `emit_event` returns once all of them have settled.
//!
//! A failing listener never reaches the emitter. Its error is logged and
//! re-emitted as a `system:listener-error` event. Failures of listeners
//! handling `system:listener-error` itself are logged and swallowed, which
//! bounds the recursion to one level.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, join_all};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use quill_core::config::EventsConfig;
use quill_core::error::AppError;
use quill_core::events::{
    Event, ListenerErrorPayload, SYSTEM_SOURCE, system, validate_event_name,
};
use quill_core::result::AppResult;
use quill_core::types::{ListenerId, ObserverId};

use super::history::{EventHistory, HistoryFilter};
use super::listener::{
    EventListener, Listener, ListenerOptions, ListenerTable, Observer, Subscription,
};
use super::metrics::{EventMetrics, EventMetricsSnapshot};
use crate::guard::{guarded, panic_message};

/// Outcome of invoking one listener for one emission.
enum Invocation {
    /// The filter rejected the event or a `once` listener was already claimed.
    Skipped,
    /// The callback completed successfully.
    Completed,
    /// The filter or callback failed.
    Failed(String),
}

/// History and metrics, updated together under one lock.
#[derive(Debug)]
struct Bookkeeping {
    history: EventHistory,
    metrics: EventMetrics,
}

/// Central pub/sub engine.
///
/// Constructed once by the host's composition root and shared by reference
/// with the lifecycle manager and every plugin context.
#[derive(Debug)]
pub struct EventManager {
    /// Listener and observer registry.
    table: Arc<ListenerTable>,
    /// History ring buffer and running metrics.
    bookkeeping: Mutex<Bookkeeping>,
    /// Optional per-listener time budget.
    handler_timeout: Option<Duration>,
}

impl EventManager {
    /// Creates an event manager from configuration.
    pub fn new(config: &EventsConfig) -> Self {
        Self {
            table: Arc::new(ListenerTable::default()),
            bookkeeping: Mutex::new(Bookkeeping {
                history: EventHistory::new(config.history_capacity),
                metrics: EventMetrics::new(config.metrics_window),
            }),
            handler_timeout: config.handler_timeout(),
        }
    }

    /// Emits an event and waits until every matching listener has settled.
    ///
    /// Fails only for an invalid event type or when the history/metrics
    /// bookkeeping cannot be updated; listener failures are never returned.
    pub async fn emit_event(
        &self,
        event_type: &str,
        data: Value,
        source: &str,
        metadata: Option<Value>,
    ) -> AppResult<()> {
        validate_event_name(event_type, false)?;
        let event = Arc::new(Event::new(event_type, data, source, metadata));
        self.dispatch(event).await
    }

    /// Registers a listener owned by `plugin_id`.
    ///
    /// `event` may be a concrete type or `"*"` to receive every event.
    pub async fn add_event_listener(
        &self,
        event: &str,
        listener: Arc<dyn EventListener>,
        plugin_id: &str,
        options: ListenerOptions,
    ) -> AppResult<Subscription> {
        validate_event_name(event, true)?;

        let id = ListenerId::new();
        self.table
            .insert(Listener {
                id,
                event: event.to_string(),
                plugin_id: plugin_id.to_string(),
                priority: options.priority,
                once: options.once,
                filter: options.filter,
                callback: listener,
                seq: self.table.next_seq(),
                claimed: Default::default(),
            })
            .await;

        debug!(
            listener_id = %id,
            event_type = %event,
            plugin_id = %plugin_id,
            priority = %options.priority,
            once = options.once,
            "Event listener registered"
        );

        Ok(Subscription::new(id, event.to_string(), &self.table))
    }

    /// Removes one listener. Returns `false` if it was not registered.
    pub async fn remove_event_listener(&self, id: ListenerId) -> bool {
        let removed = self.table.remove(id).await;
        if removed {
            debug!(listener_id = %id, "Event listener removed");
        }
        removed
    }

    /// Removes one listener if `plugin_id` owns it.
    pub(crate) async fn remove_owned_listener(&self, id: ListenerId, plugin_id: &str) -> bool {
        let removed = self.table.remove_owned(id, plugin_id).await;
        if removed {
            debug!(listener_id = %id, plugin_id = %plugin_id, "Event listener removed");
        }
        removed
    }

    /// Removes every listener owned by a plugin. Returns how many were removed.
    pub async fn remove_plugin_listeners(&self, plugin_id: &str) -> usize {
        let removed = self.table.remove_plugin(plugin_id).await;
        info!(plugin_id = %plugin_id, removed, "All event listeners removed for plugin");
        removed
    }

    /// Number of listeners registered directly for `event` (`"*"` counts
    /// the wildcard bucket).
    pub async fn listener_count(&self, event: &str) -> usize {
        self.table.count(event).await
    }

    /// Number of listeners across all event types.
    pub async fn total_listener_count(&self) -> usize {
        self.table.total().await
    }

    /// Number of listeners owned by a plugin.
    pub async fn plugin_listener_count(&self, plugin_id: &str) -> usize {
        self.table.plugin_count(plugin_id).await
    }

    /// Returns matching history entries, most recent first.
    pub fn get_event_history(&self, filter: &HistoryFilter) -> Vec<Event> {
        self.bookkeeping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .query(filter)
    }

    /// Number of events currently held in history.
    pub fn history_len(&self) -> usize {
        self.bookkeeping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .len()
    }

    /// Drops all history entries. Metrics are kept.
    pub fn clear_history(&self) {
        self.bookkeeping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clear();
    }

    /// Returns a snapshot of the running metrics.
    pub fn get_metrics(&self) -> EventMetricsSnapshot {
        self.bookkeeping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .metrics
            .snapshot()
    }

    // ── Legacy observer API ──

    /// Registers a synchronous observer for one event type. Observers run
    /// after the async listeners of an emission have settled.
    pub async fn on<F>(&self, event: &str, callback: F) -> ObserverId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add_observer(event, callback, false).await
    }

    /// Registers a synchronous observer that runs for the next emission only.
    pub async fn once<F>(&self, event: &str, callback: F) -> ObserverId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add_observer(event, callback, true).await
    }

    /// Removes an observer registered with `on`/`once`.
    pub async fn off(&self, id: ObserverId) -> bool {
        self.table.remove_observer(id).await
    }

    /// Emits an event with source `"system"` and no metadata.
    pub async fn emit(&self, event_type: &str, data: Value) -> AppResult<()> {
        self.emit_event(event_type, data, SYSTEM_SOURCE, None).await
    }

    async fn add_observer<F>(&self, event: &str, callback: F, once: bool) -> ObserverId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ObserverId::new();
        self.table
            .add_observer(
                event,
                Observer {
                    id,
                    once,
                    callback: Arc::new(callback),
                },
            )
            .await;
        id
    }

    // ── Dispatch ──

    /// Boxed so that listener-error reporting can re-enter dispatch.
    fn dispatch(&self, event: Arc<Event>) -> BoxFuture<'_, AppResult<()>> {
        async move {
            let started = Instant::now();
            self.record_emitted(&event)?;

            let listeners = self.table.resolve(&event.event_type).await;
            debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                source = %event.source,
                listener_count = listeners.len(),
                "Dispatching event"
            );

            let outcomes = join_all(
                listeners
                    .iter()
                    .map(|listener| self.invoke(listener, event.clone())),
            )
            .await;

            let mut failures = Vec::new();
            for (listener, outcome) in listeners.iter().zip(outcomes) {
                match outcome {
                    Invocation::Skipped => {}
                    Invocation::Completed => {
                        if listener.once {
                            self.table.remove(listener.id).await;
                        }
                    }
                    Invocation::Failed(message) => failures.push((listener.clone(), message)),
                }
            }

            self.notify_observers(&event).await;
            self.record_completed(started.elapsed(), !failures.is_empty())?;

            for (listener, message) in failures {
                self.report_failure(&event, &listener, message).await;
            }

            Ok(())
        }
        .boxed()
    }

    async fn invoke(&self, listener: &Listener, event: Arc<Event>) -> Invocation {
        if let Some(filter) = &listener.filter {
            let accepted = catch_unwind(AssertUnwindSafe(|| filter(event.as_ref())));
            match accepted {
                Ok(true) => {}
                Ok(false) => return Invocation::Skipped,
                Err(payload) => {
                    return Invocation::Failed(format!(
                        "filter panicked: {}",
                        panic_message(payload.as_ref())
                    ));
                }
            }
        }

        if !listener.try_claim() {
            return Invocation::Skipped;
        }

        match guarded(listener.callback.on_event(event), self.handler_timeout).await {
            Ok(()) => Invocation::Completed,
            Err(failure) => {
                listener.release();
                Invocation::Failed(failure.to_string())
            }
        }
    }

    async fn notify_observers(&self, event: &Event) {
        for callback in self.table.take_observers(&event.event_type).await {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(event)));
            if let Err(payload) = outcome {
                warn!(
                    event_type = %event.event_type,
                    error = %panic_message(payload.as_ref()),
                    "Event observer panicked"
                );
            }
        }
    }

    async fn report_failure(&self, event: &Event, listener: &Listener, message: String) {
        error!(
            listener_id = %listener.id,
            plugin_id = %listener.plugin_id,
            event_type = %event.event_type,
            event_id = %event.id,
            error = %message,
            "Event listener failed"
        );

        if event.event_type == system::LISTENER_ERROR {
            warn!(
                listener_id = %listener.id,
                plugin_id = %listener.plugin_id,
                "Listener failed while handling a listener error; not re-emitting"
            );
            return;
        }

        let payload = ListenerErrorPayload {
            listener_id: listener.id,
            plugin_id: listener.plugin_id.clone(),
            event_type: event.event_type.clone(),
            event_id: event.id,
            error: message,
        };
        let data = serde_json::to_value(&payload).unwrap_or_default();
        let error_event = Arc::new(Event::new(
            system::LISTENER_ERROR,
            data,
            SYSTEM_SOURCE,
            Some(json!({ "origin_event_id": event.id })),
        ));

        if let Err(e) = self.dispatch(error_event).await {
            error!(error = %e, "Failed to emit listener error event");
        }
    }

    fn record_emitted(&self, event: &Arc<Event>) -> AppResult<()> {
        let mut bookkeeping = self
            .bookkeeping
            .lock()
            .map_err(|_| AppError::internal("Event bookkeeping lock poisoned"))?;

        let evicted = bookkeeping.history.push(event.clone());
        if evicted > 0 {
            debug!(evicted, "Evicted oldest events from history");
        }
        bookkeeping.metrics.record_emitted(event);
        Ok(())
    }

    fn record_completed(&self, elapsed: Duration, failed: bool) -> AppResult<()> {
        self.bookkeeping
            .lock()
            .map_err(|_| AppError::internal("Event bookkeeping lock poisoned"))?
            .metrics
            .record_completed(elapsed, failed);
        Ok(())
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new(&EventsConfig::default())
    }
}
