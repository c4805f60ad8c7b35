//! Fire-and-forget event metrics emitted by the overlay.

use parking_lot::Mutex;
use tracing::debug;

use std::collections::HashMap;

pub const P2P_EVENT_METRICS_NAMESPACE: &str = "p2p";

pub const RAINTREE_MESSAGE_EVENT_METRIC_NAME: &str = "raintree_message_event_metric";
pub const RAINTREE_MESSAGE_EVENT_METRIC_SEND_LABEL: &str = "send";
pub const RAINTREE_MESSAGE_EVENT_METRIC_HEIGHT_LABEL: &str = "height";
pub const RAINTREE_MESSAGE_EVENT_METRIC_NONCE_LABEL: &str = "nonce";

pub const BROADCAST_MESSAGE_REDUNDANCY_PER_BLOCK_EVENT_METRIC_NAME: &str =
    "broadcast_message_redundancy_per_block_event_metric";

pub const RAINTREE_SEND_FAILURE_EVENT_METRIC_NAME: &str = "raintree_send_failure_event_metric";
pub const RAINTREE_SEND_FAILURE_EVENT_METRIC_ADDRESS_LABEL: &str = "address";
pub const RAINTREE_SEND_FAILURE_EVENT_METRIC_ERROR_LABEL: &str = "error";

/// A sink for event metrics. Implementations must not block.
pub trait TelemetrySink: Send + Sync {
    fn emit_event(&self, namespace: &str, event_name: &str, labels: &[(&str, String)]);
}

/// Writes every event to the `tracing` subscriber at debug level.
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn emit_event(&self, namespace: &str, event_name: &str, labels: &[(&str, String)]) {
        debug!(namespace, event_name, ?labels, "event metric");
    }
}

/// Counts the events emitted under each event name.
#[derive(Default)]
pub struct EventCounter {
    counts: Mutex<HashMap<String, usize>>,
}

impl EventCounter {
    pub fn new() -> Self {
        EventCounter::default()
    }

    pub fn count(&self, event_name: &str) -> usize {
        self.counts.lock().get(event_name).cloned().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }
}

impl TelemetrySink for EventCounter {
    fn emit_event(&self, _namespace: &str, event_name: &str, _labels: &[(&str, String)]) {
        *self.counts.lock().entry(event_name.to_owned()).or_insert(0) += 1;
    }
}
