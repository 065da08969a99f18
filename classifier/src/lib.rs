//! Agent side of the TCP protocol classifier.
//!
//! Two backends run the same pipeline from `classifier_common`: [`ebpf`] loads
//! it into the kernel as TC programs, [`userspace`] runs it over captured frames
//! in worker threads. Both report their failure counters through [`telemetry`].

pub mod agent;
pub mod ebpf;
pub mod error;
pub mod metrics;
pub mod runtime;
pub mod telemetry;
pub mod userspace;
