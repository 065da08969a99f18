#![no_std]

//! Types and logic shared by the kernel classifier and the userspace agent.
//!
//! Every `#[repr(C)]` type here crosses the kernel/user boundary through a BPF
//! map, so field order is chosen to avoid implicit padding and the layouts are
//! pinned by tests.

#[cfg(test)]
extern crate std;

pub mod classify;
pub mod fingerprint;
pub mod handler;
pub mod packet;
pub mod tuple;

pub use classify::{Dispatcher, InFlight, Outcome, Staging, Telemetry, classify};
pub use packet::{Packet, read_conn_tuple};

/// `ConnTuple::metadata` bit: transport is TCP (unset means UDP).
pub const CONN_TYPE_TCP: u32 = 1;
/// `ConnTuple::metadata` bit: addresses are IPv6 (unset means IPv4).
pub const CONN_V6: u32 = 1 << 1;

/// Upper bound on logical CPUs with a staging slot.
pub const MAX_CPUS: u32 = 1024;
/// Capacity of the in-flight table when nothing else is configured.
pub const IN_FLIGHT_MAX_ENTRIES: u32 = 65536;

/// Identity of a transport connection.
///
/// IPv4 addresses are stored in the `*_l` halves as the host-order value of the
/// 32-bit address with `*_h` zeroed. IPv6 addresses are split into the high and
/// low 64 bits, host order.
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConnTuple {
    pub saddr_h: u64,
    pub saddr_l: u64,
    pub daddr_h: u64,
    pub daddr_l: u64,
    pub sport: u16,
    pub dport: u16,
    pub netns: u32,
    pub pid: u32,
    pub metadata: u32,
}

impl ConnTuple {
    #[inline]
    pub fn is_tcp(&self) -> bool {
        self.metadata & CONN_TYPE_TCP != 0
    }

    #[inline]
    pub fn is_ipv6(&self) -> bool {
        self.metadata & CONN_V6 != 0
    }
}

/// Classification state of a connection. Absence from the table means pending.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnInfo {
    pub done: u8,
    pub failed: u8,
}

impl ConnInfo {
    pub const DONE: ConnInfo = ConnInfo { done: 1, failed: 0 };
    pub const FAILED: ConnInfo = ConnInfo { done: 0, failed: 1 };

    /// True once the connection must never be fingerprinted again.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.done != 0 || self.failed != 0
    }
}

/// Header metadata captured while reading the tuple.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkbInfo {
    /// Offset of the first L4 payload byte from the start of the frame.
    pub data_off: u32,
    /// Frame length; payload spans `data_off..data_end`.
    pub data_end: u32,
    pub tcp_seq: u32,
    pub tcp_flags: u8,
    pub _pad: [u8; 3],
}

impl SkbInfo {
    #[inline]
    pub fn payload_len(&self) -> u32 {
        self.data_end.saturating_sub(self.data_off)
    }

    #[inline]
    pub fn fin(&self) -> bool {
        network_types::tcp::fin_flag(self.tcp_flags)
    }
}

/// What a protocol handler needs to pick up a packet after dispatch.
/// One copy per CPU lives in the staging area.
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketContext {
    pub tup: ConnTuple,
    pub skb_info: SkbInfo,
    /// CPU that staged this context.
    pub cpu: u32,
    /// `ProtocolId` the fingerprint engine returned.
    pub protocol: u8,
    pub _pad: [u8; 3],
}

/// Application protocol as reported by the fingerprint engine.
/// The discriminant is also the dispatch-table index.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolId {
    #[default]
    Unknown = 0,
    Tls = 1,
    Http = 2,
}

/// Number of dispatch-table slots, including the never-dispatched `Unknown`.
pub const PROTOCOL_MAX: u32 = 3;

impl ProtocolId {
    /// Every protocol that can be dispatched, in fingerprint priority order.
    pub const KNOWN: [ProtocolId; 2] = [ProtocolId::Tls, ProtocolId::Http];

    #[inline]
    pub fn index(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn is_known(self) -> bool {
        self != ProtocolId::Unknown
    }

    pub fn try_from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ProtocolId::Unknown),
            1 => Some(ProtocolId::Tls),
            2 => Some(ProtocolId::Http),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolId::Unknown => "unknown",
            ProtocolId::Tls => "tls",
            ProtocolId::Http => "http",
        }
    }
}

/// Failure counters. The discriminant is the telemetry map index.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryCounter {
    /// Dispatch found no handler for an identified protocol.
    TailCallFailed = 0,
    /// The packet context could not be written to the CPU's staging slot.
    StagingFailed = 1,
}

pub const TELEMETRY_COUNTERS: u32 = 2;

impl TelemetryCounter {
    pub const ALL: [TelemetryCounter; TELEMETRY_COUNTERS as usize] = [
        TelemetryCounter::TailCallFailed,
        TelemetryCounter::StagingFailed,
    ];

    #[inline]
    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryCounter::TailCallFailed => "tail_call_failed",
            TelemetryCounter::StagingFailed => "staging_failed",
        }
    }
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for ConnTuple {}
#[cfg(feature = "user")]
unsafe impl aya::Pod for ConnInfo {}
#[cfg(feature = "user")]
unsafe impl aya::Pod for SkbInfo {}
#[cfg(feature = "user")]
unsafe impl aya::Pod for PacketContext {}
