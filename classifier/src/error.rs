//! Errors surfaced while starting or running the agent.

use std::io;

use thiserror::Error;

use crate::{
    metrics::error::MetricsError,
    runtime::{capabilities::CapabilityError, conf::ConfigError},
};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capabilities(#[from] CapabilityError),

    /// The binary was built without a kernel object.
    #[error("this build carries no eBPF object; rebuild with bpf-linker installed or use the userspace backend")]
    EbpfUnavailable,

    #[error("failed to load eBPF object: {0}")]
    Ebpf(#[from] aya::EbpfError),

    #[error("eBPF program error: {0}")]
    Program(#[from] aya::programs::ProgramError),

    #[error("eBPF map error: {0}")]
    Map(#[from] aya::maps::MapError),

    #[error("program '{0}' not found in the eBPF object")]
    MissingProgram(&'static str),

    #[error("map '{0}' not found in the eBPF object")]
    MissingMap(&'static str),

    #[error("interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("failed to open capture on {interface}: {source}")]
    Capture {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("capture on {0} does not deliver ethernet frames")]
    UnsupportedChannel(String),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AgentError {
    pub fn capture(interface: impl Into<String>, source: io::Error) -> Self {
        Self::Capture {
            interface: interface.into(),
            source,
        }
    }
}
