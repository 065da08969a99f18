//! Classification in ordinary threads.
//!
//! Each worker thread plays the part of one CPU: it owns a staging slot and a
//! telemetry row, and frames of one connection always reach the same worker.

use classifier_common::{Outcome, ProtocolId, classify};

use crate::{
    error::AgentError,
    telemetry::{TelemetrySnapshot, TelemetrySource},
    userspace::{
        dispatch::{DispatchTable, Trampoline},
        in_flight::InFlightTable,
        staging::StagingBuffer,
        telemetry::CpuTelemetry,
    },
};

pub mod capture;
pub mod dispatch;
pub mod in_flight;
pub mod staging;
pub mod telemetry;
pub mod worker;

pub struct UserspaceBackend {
    in_flight: InFlightTable,
    staging: StagingBuffer,
    dispatch: DispatchTable,
    telemetry: CpuTelemetry,
}

impl UserspaceBackend {
    /// `cpus` sizes the staging slots and telemetry rows.
    pub fn new(cpus: usize, max_entries: usize, dispatch: DispatchTable) -> Self {
        Self {
            in_flight: InFlightTable::new(max_entries),
            staging: StagingBuffer::new(cpus),
            dispatch,
            telemetry: CpuTelemetry::new(cpus),
        }
    }

    /// A backend with the built-in handler for each of `protocols`.
    pub fn with_protocols(cpus: usize, max_entries: usize, protocols: &[ProtocolId]) -> Self {
        Self::new(cpus, max_entries, DispatchTable::with_protocols(protocols))
    }

    /// Runs the pipeline for one Ethernet frame as if on `cpu`.
    pub fn process(&self, frame: &[u8], cpu: u32) -> Outcome {
        let trampoline = Trampoline {
            table: &self.dispatch,
            staging: &self.staging,
            in_flight: &self.in_flight,
        };
        classify(
            frame,
            cpu,
            &self.in_flight,
            &self.staging,
            &trampoline,
            &self.telemetry.for_cpu(cpu),
        )
    }

    pub fn cpus(&self) -> usize {
        self.staging.cpus()
    }

    pub fn in_flight(&self) -> &InFlightTable {
        &self.in_flight
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }
}

impl TelemetrySource for UserspaceBackend {
    fn snapshot(&self) -> Result<TelemetrySnapshot, AgentError> {
        Ok(self.telemetry.snapshot())
    }

    fn in_flight_entries(&self) -> Option<usize> {
        Some(self.in_flight.len())
    }
}
