//! Bounded event history ring buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use quill_core::events::Event;

/// Query accepted by `get_event_history`. All criteria are optional and
/// combined with AND.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Exact event type.
    pub event_type: Option<String>,
    /// Exact source.
    pub source: Option<String>,
    /// Only events at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of events returned.
    pub limit: Option<usize>,
}

impl HistoryFilter {
    /// Matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Restricts to one source.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Restricts to events at or after `since`.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Caps the number of returned events.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, event: &Event) -> bool {
        self.event_type
            .as_deref()
            .is_none_or(|t| t == event.event_type)
            && self.source.as_deref().is_none_or(|s| s == event.source)
            && self.since.is_none_or(|since| event.timestamp >= since)
    }
}

/// FIFO ring buffer of emitted events.
#[derive(Debug)]
pub(crate) struct EventHistory {
    events: VecDeque<Arc<Event>>,
    capacity: usize,
}

impl EventHistory {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends an event, evicting the oldest ones beyond capacity.
    /// Returns the number of evicted events.
    pub(crate) fn push(&mut self, event: Arc<Event>) -> usize {
        self.events.push_back(event);

        let mut evicted = 0;
        while self.events.len() > self.capacity {
            self.events.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Returns matching events, most recent first. Does not drain.
    pub(crate) fn query(&self, filter: &HistoryFilter) -> Vec<Event> {
        self.events
            .iter()
            .rev()
            .filter(|event| filter.matches(event))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|event| event.as_ref().clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, source: &str, n: i64) -> Arc<Event> {
        Arc::new(Event::new(event_type, json!({ "n": n }), source, None))
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut history = EventHistory::new(3);
        for n in 0..5 {
            history.push(event("content:created", "system", n));
        }

        assert_eq!(history.len(), 3);
        let ns: Vec<i64> = history
            .query(&HistoryFilter::new())
            .iter()
            .map(|e| e.data["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![4, 3, 2]);
    }

    #[test]
    fn test_filter_and_limit() {
        let mut history = EventHistory::new(10);
        history.push(event("content:created", "system", 1));
        history.push(event("user:login", "oauth", 2));
        history.push(event("content:created", "seo", 3));
        history.push(event("content:created", "system", 4));

        let by_type = history.query(&HistoryFilter::new().event_type("content:created"));
        assert_eq!(by_type.len(), 3);

        let by_source = history.query(&HistoryFilter::new().source("system").limit(1));
        assert_eq!(by_source.len(), 1);
        assert_eq!(by_source[0].data["n"], 4);

        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(history.query(&HistoryFilter::new().since(future)).is_empty());
    }

    #[test]
    fn test_query_does_not_drain() {
        let mut history = EventHistory::new(10);
        history.push(event("content:created", "system", 1));
        assert_eq!(history.query(&HistoryFilter::new()).len(), 1);
        assert_eq!(history.query(&HistoryFilter::new()).len(), 1);

        history.clear();
        assert_eq!(history.len(), 0);
    }
}
