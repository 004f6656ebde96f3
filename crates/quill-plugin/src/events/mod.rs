//! Event manager: priority-ordered pub/sub with history and metrics.

pub mod history;
pub mod listener;
pub mod manager;
pub mod metrics;

pub use history::HistoryFilter;
pub use listener::{EventListener, ListenerFilter, ListenerOptions, Subscription};
pub use manager::EventManager;
pub use metrics::EventMetricsSnapshot;
