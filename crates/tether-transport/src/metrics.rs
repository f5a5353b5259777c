//! Transport metrics.
//!
//! Uses the `metrics` crate for instrumentation. Nothing is recorded
//! until the application installs a recorder.

use metrics::counter;

use crate::error::ErrorKind;

/// Metric names.
pub mod names {
    pub const OPENS_TOTAL: &str = "tether_transport_opens_total";
    pub const CLOSES_TOTAL: &str = "tether_transport_closes_total";
    pub const PACKETS_SENT_TOTAL: &str = "tether_packets_sent_total";
    pub const PACKETS_RECEIVED_TOTAL: &str = "tether_packets_received_total";
    pub const ERRORS_TOTAL: &str = "tether_transport_errors_total";
}

/// Register metric descriptions.
pub fn describe_metrics() {
    metrics::describe_counter!(names::OPENS_TOTAL, "Transports that finished opening");
    metrics::describe_counter!(names::CLOSES_TOTAL, "Transports that closed");
    metrics::describe_counter!(names::PACKETS_SENT_TOTAL, "Packets handed to drivers");
    metrics::describe_counter!(names::PACKETS_RECEIVED_TOTAL, "Packets decoded from inbound data");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Transport errors by kind");
}

pub(crate) fn record_open(transport: &'static str) {
    counter!(names::OPENS_TOTAL, "transport" => transport).increment(1);
}

pub(crate) fn record_close(transport: &'static str) {
    counter!(names::CLOSES_TOTAL, "transport" => transport).increment(1);
}

pub(crate) fn record_sent(transport: &'static str, count: usize) {
    counter!(names::PACKETS_SENT_TOTAL, "transport" => transport).increment(count as u64);
}

pub(crate) fn record_received(transport: &'static str) {
    counter!(names::PACKETS_RECEIVED_TOTAL, "transport" => transport).increment(1);
}

pub(crate) fn record_error(transport: &'static str, kind: ErrorKind) {
    counter!(names::ERRORS_TOTAL, "transport" => transport, "kind" => kind.as_str()).increment(1);
}
