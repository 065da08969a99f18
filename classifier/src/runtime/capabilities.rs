//! Capability checking for required Linux capabilities.
//!
//! The kernel backend needs:
//! - CAP_BPF: load programs and create maps
//! - CAP_PERFMON: pointer arithmetic on packet data in the verifier (kernel >= 5.8)
//! - CAP_NET_ADMIN: add the clsact qdisc and attach TC programs
//!
//! The userspace backend needs CAP_NET_RAW to open packet sockets.

use std::{fmt::Write as _, fs, io};

use thiserror::Error;
use tracing::{debug, warn};

use crate::runtime::conf::Backend;

/// Linux capability constants from <linux/capability.h>
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    NetAdmin = 12,
    NetRaw = 13,
    SysAdmin = 21,
    Perfmon = 38,
    Bpf = 39,
}

impl Capability {
    fn name(&self) -> &'static str {
        match self {
            Capability::NetAdmin => "CAP_NET_ADMIN",
            Capability::NetRaw => "CAP_NET_RAW",
            Capability::SysAdmin => "CAP_SYS_ADMIN",
            Capability::Perfmon => "CAP_PERFMON",
            Capability::Bpf => "CAP_BPF",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Capability::NetAdmin => "attach TC programs to network interfaces",
            Capability::NetRaw => "capture frames from network interfaces",
            Capability::SysAdmin => "load eBPF programs on kernels older than 5.8",
            Capability::Perfmon => "let the verifier accept packet pointer arithmetic",
            Capability::Bpf => "load eBPF programs and create maps",
        }
    }

    fn required_for(backend: Backend) -> &'static [Capability] {
        match backend {
            Backend::Ebpf => &[Capability::NetAdmin, Capability::Bpf, Capability::Perfmon],
            Backend::Userspace => &[Capability::NetRaw],
        }
    }
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("failed to read /proc/self/status: {0}")]
    Status(#[from] io::Error),

    #[error("failed to parse capability mask '{0}'")]
    Parse(String),

    #[error("CapEff line not found in /proc/self/status")]
    NoEffectiveSet,

    #[error("{0}")]
    Missing(String),
}

/// Extracts the effective capability mask from the text of `/proc/<pid>/status`.
fn effective_mask(status: &str) -> Result<u64, CapabilityError> {
    let caps_hex = status
        .lines()
        .find_map(|line| line.strip_prefix("CapEff:"))
        .map(str::trim)
        .ok_or(CapabilityError::NoEffectiveSet)?;

    u64::from_str_radix(caps_hex, 16).map_err(|_| CapabilityError::Parse(caps_hex.to_string()))
}

fn has(mask: u64, cap: Capability) -> bool {
    mask & (1u64 << (cap as u32)) != 0
}

/// Capabilities from `required` that `mask` lacks. CAP_BPF and CAP_PERFMON
/// were split out of CAP_SYS_ADMIN in 5.8; holding CAP_SYS_ADMIN covers both.
fn missing(mask: u64, required: &[Capability]) -> Vec<Capability> {
    required
        .iter()
        .copied()
        .filter(|cap| {
            debug!(
                event.name = "capabilities.checking",
                capability = cap.name(),
                "checking for required capability"
            );
            if has(mask, *cap) {
                return false;
            }
            if matches!(cap, Capability::Perfmon | Capability::Bpf)
                && has(mask, Capability::SysAdmin)
            {
                warn!(
                    event.name = "capabilities.missing_fallback",
                    capability = cap.name(),
                    description = cap.description(),
                    "capability not found, relying on CAP_SYS_ADMIN"
                );
                return false;
            }
            true
        })
        .collect()
}

/// Check the capabilities `backend` needs at startup.
/// Returns a detailed error listing every missing capability.
pub fn check_required_capabilities(backend: Backend) -> Result<(), CapabilityError> {
    let status = fs::read_to_string("/proc/self/status")?;
    let mask = match effective_mask(&status) {
        Ok(mask) => mask,
        Err(e) => {
            // Operations that need the capability will fail with their own error.
            warn!(
                event.name = "capabilities.check_failed",
                error.message = %e,
                "failed to check capabilities, assuming present"
            );
            return Ok(());
        }
    };

    let missing_caps = missing(mask, Capability::required_for(backend));
    if missing_caps.is_empty() {
        return Ok(());
    }

    let mut error_msg = format!("missing required capabilities for the {backend} backend:\n");
    for cap in missing_caps {
        let _ = writeln!(error_msg, "  {} - required to {}", cap.name(), cap.description());
    }
    error_msg.push_str("run as root or grant the capabilities above");
    Err(CapabilityError::Missing(error_msg))
}
