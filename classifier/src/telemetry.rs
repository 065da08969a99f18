//! Periodic export of the backend's failure counters.
//!
//! Counters are bumped on the packet path without synchronization and only
//! read here, off the hot path, on a fixed interval.

use std::{sync::Arc, time::Duration};

use classifier_common::{TELEMETRY_COUNTERS, TelemetryCounter};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::{error::AgentError, metrics};

/// Totals of every telemetry counter, summed across CPUs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    counts: [u64; TELEMETRY_COUNTERS as usize],
}

impl TelemetrySnapshot {
    pub fn get(&self, counter: TelemetryCounter) -> u64 {
        self.counts[counter.index() as usize]
    }

    pub fn add(&mut self, counter: TelemetryCounter, value: u64) {
        let slot = &mut self.counts[counter.index() as usize];
        *slot = slot.saturating_add(value);
    }
}

/// Something the poller can read counters from.
pub trait TelemetrySource: Send + Sync {
    fn snapshot(&self) -> Result<TelemetrySnapshot, AgentError>;

    /// Live in-flight entry count, when the backend can report it cheaply.
    fn in_flight_entries(&self) -> Option<usize> {
        None
    }
}

/// Reads `source` once and publishes the result.
pub fn publish(source: &dyn TelemetrySource) {
    match source.snapshot() {
        Ok(snapshot) => {
            metrics::set_telemetry(&snapshot);
            debug!(
                event.name = "telemetry.published",
                tail_call_failed = snapshot.get(TelemetryCounter::TailCallFailed),
                staging_failed = snapshot.get(TelemetryCounter::StagingFailed),
                "telemetry counters published"
            );
        }
        Err(e) => {
            warn!(
                event.name = "telemetry.read_failed",
                error.message = %e,
                "failed to read telemetry counters"
            );
        }
    }
    if let Some(entries) = source.in_flight_entries() {
        metrics::set_in_flight_entries(entries);
    }
}

/// Publishes every `interval` until a shutdown is broadcast, then once more so
/// the final counts are visible.
pub async fn run_poller(
    source: Arc<dyn TelemetrySource>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                publish(source.as_ref());
                trace!(
                    event.name = "task.stopped",
                    task.name = "telemetry_poller",
                    "telemetry poller stopping gracefully"
                );
                break;
            }
            _ = ticker.tick() => publish(source.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use serial_test::serial;

    use super::*;
    use crate::metrics::registry;

    struct Fixed {
        tail_calls: AtomicU64,
        reads: AtomicUsize,
    }

    impl TelemetrySource for Fixed {
        fn snapshot(&self) -> Result<TelemetrySnapshot, AgentError> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            let mut snapshot = TelemetrySnapshot::default();
            snapshot.add(
                TelemetryCounter::TailCallFailed,
                self.tail_calls.load(Ordering::Relaxed),
            );
            Ok(snapshot)
        }
    }

    #[test]
    fn snapshot_add_saturates() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.add(TelemetryCounter::StagingFailed, u64::MAX);
        snapshot.add(TelemetryCounter::StagingFailed, 5);
        assert_eq!(snapshot.get(TelemetryCounter::StagingFailed), u64::MAX);
        assert_eq!(snapshot.get(TelemetryCounter::TailCallFailed), 0);
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn poller_publishes_until_shutdown() {
        registry::init_registry().unwrap();
        let source = Arc::new(Fixed {
            tail_calls: AtomicU64::new(7),
            reads: AtomicUsize::new(0),
        });
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(run_poller(source.clone(), Duration::from_secs(10), rx));

        tokio::time::sleep(Duration::from_secs(25)).await;
        let reads = source.reads.load(Ordering::Relaxed);
        assert!(reads >= 3, "expected ticks at 0s, 10s and 20s, saw {reads}");
        assert_eq!(registry::TELEMETRY_TAIL_CALL_FAILED.get(), 7);

        source.tail_calls.store(9, Ordering::Relaxed);
        tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(registry::TELEMETRY_TAIL_CALL_FAILED.get(), 9);
    }
}
