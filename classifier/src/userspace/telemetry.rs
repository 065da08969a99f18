use std::sync::atomic::{AtomicU64, Ordering};

use classifier_common::{TELEMETRY_COUNTERS, Telemetry, TelemetryCounter};

use crate::telemetry::TelemetrySnapshot;

type Row = [AtomicU64; TELEMETRY_COUNTERS as usize];

/// Failure counters with one row per logical CPU, mirroring a per-CPU array.
pub struct CpuTelemetry {
    rows: Box<[Row]>,
}

impl CpuTelemetry {
    pub fn new(cpus: usize) -> Self {
        Self {
            rows: (0..cpus).map(|_| Row::default()).collect(),
        }
    }

    /// Counter handle for one CPU. Increments for a CPU without a row are dropped.
    pub fn for_cpu(&self, cpu: u32) -> CpuCounters<'_> {
        CpuCounters {
            row: self.rows.get(cpu as usize),
        }
    }

    /// Sums every CPU's row.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::default();
        for row in self.rows.iter() {
            for counter in TelemetryCounter::ALL {
                snapshot.add(counter, row[counter.index() as usize].load(Ordering::Relaxed));
            }
        }
        snapshot
    }
}

pub struct CpuCounters<'a> {
    row: Option<&'a Row>,
}

impl Telemetry for CpuCounters<'_> {
    fn increment(&self, counter: TelemetryCounter) {
        if let Some(row) = self.row {
            row[counter.index() as usize].fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn snapshot_sums_across_cpus() {
        let telemetry = CpuTelemetry::new(3);
        telemetry.for_cpu(0).increment(TelemetryCounter::TailCallFailed);
        telemetry.for_cpu(2).increment(TelemetryCounter::TailCallFailed);
        telemetry.for_cpu(2).increment(TelemetryCounter::StagingFailed);

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.get(TelemetryCounter::TailCallFailed), 2);
        assert_eq!(snapshot.get(TelemetryCounter::StagingFailed), 1);
    }

    #[test]
    fn unknown_cpu_is_ignored() {
        let telemetry = CpuTelemetry::new(1);
        telemetry.for_cpu(9).increment(TelemetryCounter::TailCallFailed);
        assert_eq!(telemetry.snapshot(), TelemetrySnapshot::default());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let telemetry = Arc::new(CpuTelemetry::new(4));
        let handles: Vec<_> = (0..4u32)
            .map(|cpu| {
                let telemetry = Arc::clone(&telemetry);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        telemetry.for_cpu(cpu).increment(TelemetryCounter::TailCallFailed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(telemetry.snapshot().get(TelemetryCounter::TailCallFailed), 4000);
    }
}
