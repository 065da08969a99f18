//! The per-packet classification pipeline.
//!
//! `classify` is written once and runs unchanged in the kernel program and in
//! the userspace backend. The five traits below are the only places where the
//! two differ: how packet bytes are read, where connection state lives, how a
//! context is staged for the current CPU, how control reaches a handler, and
//! where failure counts go.

use crate::{
    ConnInfo, ConnTuple, Packet, PacketContext, ProtocolId, TelemetryCounter,
    fingerprint::fingerprint, read_conn_tuple, tuple::normalize,
};

/// Connection state shared by every CPU. Implementations must tolerate
/// concurrent writers without locking; last writer wins.
pub trait InFlight {
    fn lookup(&self, tup: &ConnTuple) -> Option<ConnInfo>;

    fn mark_done(&self, tup: &ConnTuple);

    fn mark_failed(&self, tup: &ConnTuple);

    /// Removes the entry whatever its state. Missing entries are not an error.
    fn evict(&self, tup: &ConnTuple);
}

/// One scratch slot per CPU.
pub trait Staging {
    /// Overwrites `cpu`'s slot. Fails when the slot cannot be written.
    fn stage(&self, cpu: u32, ctx: &PacketContext) -> Result<(), ()>;
}

/// Hands the packet to the handler registered for a protocol.
pub trait Dispatcher<P: Packet + ?Sized> {
    /// On success a kernel implementation never returns; returning at all
    /// there means the transfer failed.
    fn dispatch(&self, pkt: &P, cpu: u32, protocol: ProtocolId) -> Result<(), ()>;
}

/// Fire-and-forget failure counters.
pub trait Telemetry {
    fn increment(&self, counter: TelemetryCounter);
}

/// What happened to one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a TCP packet we can read.
    Ignored,
    /// FIN seen; the connection's entry was removed.
    Evicted,
    /// Connection already done or failed; nothing ran.
    Resolved,
    /// No fingerprint rule matched.
    Unclassified,
    /// A rule matched but the context could not be staged.
    StagingFailed(ProtocolId),
    /// A rule matched but no handler took the packet.
    DispatchFailed(ProtocolId),
    /// The handler for the protocol ran.
    Dispatched(ProtocolId),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ignored => "ignored",
            Outcome::Evicted => "evicted",
            Outcome::Resolved => "resolved",
            Outcome::Unclassified => "unclassified",
            Outcome::StagingFailed(_) => "staging_failed",
            Outcome::DispatchFailed(_) => "dispatch_failed",
            Outcome::Dispatched(_) => "dispatched",
        }
    }
}

/// Classifies one packet observed on `cpu`.
///
/// The tuple is normalized before the table is touched so both directions
/// of a flow share one entry. A FIN evicts the entry and ends processing for
/// that packet. Resolved connections skip the fingerprint rules entirely.
/// Staging and dispatch failures only bump their counter: the entry is left
/// pending so a later packet can retry.
#[inline(always)]
pub fn classify<P, M, S, D, T>(
    pkt: &P,
    cpu: u32,
    in_flight: &M,
    staging: &S,
    dispatcher: &D,
    telemetry: &T,
) -> Outcome
where
    P: Packet + ?Sized,
    M: InFlight,
    S: Staging,
    D: Dispatcher<P>,
    T: Telemetry,
{
    let Some(mut ctx) = read_conn_tuple(pkt) else {
        return Outcome::Ignored;
    };
    if !ctx.tup.is_tcp() {
        return Outcome::Ignored;
    }
    normalize(&mut ctx.tup);

    if ctx.skb_info.fin() {
        in_flight.evict(&ctx.tup);
        return Outcome::Evicted;
    }

    if let Some(info) = in_flight.lookup(&ctx.tup) {
        if info.is_resolved() {
            return Outcome::Resolved;
        }
    }

    let protocol = fingerprint(&ctx.tup, &ctx.skb_info, pkt);
    if !protocol.is_known() {
        return Outcome::Unclassified;
    }

    ctx.cpu = cpu;
    ctx.protocol = protocol as u8;
    if staging.stage(cpu, &ctx).is_err() {
        telemetry.increment(TelemetryCounter::StagingFailed);
        return Outcome::StagingFailed(protocol);
    }

    if dispatcher.dispatch(pkt, cpu, protocol).is_err() {
        telemetry.increment(TelemetryCounter::TailCallFailed);
        return Outcome::DispatchFailed(protocol);
    }
    Outcome::Dispatched(protocol)
}
