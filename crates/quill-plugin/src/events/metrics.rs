//! Running event metrics.
//!
//! `average_processing_time` is an arithmetic mean over a sliding window of
//! completed emissions, while `error_rate` is an exponential moving average
//! that moves only when an emission had at least one failing listener.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use quill_core::events::Event;

/// Weight of the previous value in the error-rate moving average.
const ERROR_RATE_DECAY: f64 = 0.9;

/// Point-in-time copy of the event metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetricsSnapshot {
    /// Total events emitted.
    pub total_events: u64,
    /// Event count per event type.
    pub events_per_type: HashMap<String, u64>,
    /// Event count per source (plugin id or `"system"`).
    pub events_per_plugin: HashMap<String, u64>,
    /// Mean processing time of recent emissions, in milliseconds.
    pub average_processing_time_ms: f64,
    /// Moving average of failed emissions.
    pub error_rate: f64,
}

/// Metrics accumulator owned by the event manager.
#[derive(Debug)]
pub(crate) struct EventMetrics {
    total_events: u64,
    events_per_type: HashMap<String, u64>,
    events_per_plugin: HashMap<String, u64>,
    durations: VecDeque<Duration>,
    window: usize,
    error_rate: f64,
}

impl EventMetrics {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            total_events: 0,
            events_per_type: HashMap::new(),
            events_per_plugin: HashMap::new(),
            durations: VecDeque::with_capacity(window),
            window: window.max(1),
            error_rate: 0.0,
        }
    }

    /// Counts an emitted event.
    pub(crate) fn record_emitted(&mut self, event: &Event) {
        self.total_events += 1;
        *self
            .events_per_type
            .entry(event.event_type.clone())
            .or_default() += 1;
        *self
            .events_per_plugin
            .entry(event.source.clone())
            .or_default() += 1;
    }

    /// Records a completed emission.
    pub(crate) fn record_completed(&mut self, elapsed: Duration, failed: bool) {
        self.durations.push_back(elapsed);
        while self.durations.len() > self.window {
            self.durations.pop_front();
        }

        if failed {
            self.error_rate = ERROR_RATE_DECAY * self.error_rate + (1.0 - ERROR_RATE_DECAY);
        }
    }

    pub(crate) fn snapshot(&self) -> EventMetricsSnapshot {
        let average_processing_time_ms = if self.durations.is_empty() {
            0.0
        } else {
            let total: f64 = self
                .durations
                .iter()
                .map(|d| d.as_secs_f64() * 1000.0)
                .sum();
            total / self.durations.len() as f64
        };

        EventMetricsSnapshot {
            total_events: self.total_events,
            events_per_type: self.events_per_type.clone(),
            events_per_plugin: self.events_per_plugin.clone(),
            average_processing_time_ms,
            error_rate: self.error_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_counts_per_type_and_source() {
        let mut metrics = EventMetrics::new(100);
        metrics.record_emitted(&Event::new("content:created", Value::Null, "system", None));
        metrics.record_emitted(&Event::new("content:created", Value::Null, "seo", None));
        metrics.record_emitted(&Event::new("user:login", Value::Null, "seo", None));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.events_per_type["content:created"], 2);
        assert_eq!(snapshot.events_per_plugin["seo"], 2);
        assert_eq!(snapshot.events_per_plugin["system"], 1);
    }

    #[test]
    fn test_average_is_a_sliding_mean() {
        let mut metrics = EventMetrics::new(2);
        metrics.record_completed(Duration::from_millis(100), false);
        metrics.record_completed(Duration::from_millis(10), false);
        metrics.record_completed(Duration::from_millis(30), false);

        let average = metrics.snapshot().average_processing_time_ms;
        assert!((average - 20.0).abs() < 1e-9, "got {average}");
    }

    #[test]
    fn test_error_rate_moves_only_on_failure() {
        let mut metrics = EventMetrics::new(100);
        metrics.record_completed(Duration::ZERO, true);
        assert!((metrics.snapshot().error_rate - 0.1).abs() < 1e-9);

        metrics.record_completed(Duration::ZERO, true);
        assert!((metrics.snapshot().error_rate - 0.19).abs() < 1e-9);

        // Successful emissions leave the rate untouched.
        metrics.record_completed(Duration::ZERO, false);
        assert!((metrics.snapshot().error_rate - 0.19).abs() < 1e-9);
    }
}
