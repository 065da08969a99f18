//! Prometheus metrics for the agent, served over HTTP at `/metrics`.

use classifier_common::{Outcome, TelemetryCounter};

use crate::telemetry::TelemetrySnapshot;

pub mod error;
pub mod registry;
pub mod server;

/// Mirror the backend's failure counters into their gauges.
pub fn set_telemetry(snapshot: &TelemetrySnapshot) {
    registry::TELEMETRY_TAIL_CALL_FAILED
        .set(snapshot.get(TelemetryCounter::TailCallFailed) as i64);
    registry::TELEMETRY_STAGING_FAILED.set(snapshot.get(TelemetryCounter::StagingFailed) as i64);
}

pub fn inc_packets(outcome: Outcome) {
    registry::PACKETS_TOTAL
        .with_label_values(&[outcome.as_str()])
        .inc();
}

pub fn set_in_flight_entries(entries: usize) {
    registry::IN_FLIGHT_ENTRIES.set(entries as i64);
}

pub fn inc_in_flight_update_failures() {
    registry::IN_FLIGHT_UPDATE_FAILURES_TOTAL.inc();
}

pub fn inc_worker_queue_dropped() {
    registry::WORKER_QUEUE_DROPPED_TOTAL.inc();
}
