//! Global metrics registry and collector definitions.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry for every classifier metric.
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Telemetry counters mirrored from the active backend
    // ============================================================================

    pub static ref TELEMETRY_TAIL_CALL_FAILED: IntGauge = IntGauge::with_opts(
        Opts::new("tail_call_failed", "Packets whose protocol matched but had no handler to dispatch to, summed across CPUs")
            .namespace("classifier")
            .subsystem("telemetry")
    ).expect("failed to create telemetry_tail_call_failed metric");

    pub static ref TELEMETRY_STAGING_FAILED: IntGauge = IntGauge::with_opts(
        Opts::new("staging_failed", "Packets whose protocol matched but whose context could not be staged, summed across CPUs")
            .namespace("classifier")
            .subsystem("telemetry")
    ).expect("failed to create telemetry_staging_failed metric");

    // ============================================================================
    // Userspace backend
    // ============================================================================

    /// Labels: outcome = "ignored" | "evicted" | "resolved" | "unclassified"
    /// | "staging_failed" | "dispatch_failed" | "dispatched"
    pub static ref PACKETS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("packets_total", "Packets processed by the userspace backend, by outcome")
            .namespace("classifier"),
        &["outcome"]
    ).expect("failed to create packets_total metric");

    pub static ref IN_FLIGHT_ENTRIES: IntGauge = IntGauge::with_opts(
        Opts::new("entries", "Connections currently tracked in the in-flight table")
            .namespace("classifier")
            .subsystem("in_flight")
    ).expect("failed to create in_flight_entries metric");

    pub static ref IN_FLIGHT_UPDATE_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("update_failures_total", "In-flight inserts dropped because the table was full")
            .namespace("classifier")
            .subsystem("in_flight")
    ).expect("failed to create in_flight_update_failures_total metric");

    pub static ref WORKER_QUEUE_DROPPED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("queue_dropped_total", "Captured frames dropped because a worker queue was full")
            .namespace("classifier")
            .subsystem("worker")
    ).expect("failed to create worker_queue_dropped_total metric");
}

/// Registers a collector, tolerating a previous registration of the same one.
macro_rules! register {
    ($collector:expr) => {
        match REGISTRY.register(Box::new($collector.clone())) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    };
}

/// Registers every collector with [`REGISTRY`]. Safe to call more than once.
pub fn init_registry() -> Result<(), prometheus::Error> {
    register!(TELEMETRY_TAIL_CALL_FAILED);
    register!(TELEMETRY_STAGING_FAILED);

    register!(PACKETS_TOTAL);
    register!(IN_FLIGHT_ENTRIES);
    register!(IN_FLIGHT_UPDATE_FAILURES_TOTAL);
    register!(WORKER_QUEUE_DROPPED_TOTAL);

    Ok(())
}
