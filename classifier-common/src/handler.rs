//! Confirmation logic run by protocol handlers after dispatch.
//!
//! A handler only sees the packet plus the context staged on its own CPU. It
//! re-validates the payload with the stricter view it has of its protocol and
//! reports what should happen to the connection's in-flight entry.

use network_types::tls::{CONTENT_APPLICATION_DATA, CONTENT_HANDSHAKE, TlsRecordHdr};

use crate::{
    Packet, PacketContext, ProtocolId,
    fingerprint::{is_http, is_tls},
    read_conn_tuple,
    tuple::normalized,
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerVerdict {
    /// Not conclusive yet; the connection stays pending.
    NeedMore = 0,
    /// Protocol confirmed; mark the connection done.
    Confirmed = 1,
    /// The payload contradicts the protocol; mark the connection failed.
    Rejected = 2,
}

/// True when `staged` describes `pkt`. A mismatch means the slot was written
/// for some other packet and must not be trusted.
pub fn staged_for<P: Packet + ?Sized>(staged: &PacketContext, pkt: &P) -> bool {
    match read_conn_tuple(pkt) {
        Some(current) => {
            normalized(current.tup) == staged.tup && current.skb_info == staged.skb_info
        }
        None => false,
    }
}

/// Runs the handler for `protocol` against the staged context.
pub fn handle<P: Packet + ?Sized>(
    protocol: ProtocolId,
    staged: &PacketContext,
    pkt: &P,
) -> HandlerVerdict {
    if !staged_for(staged, pkt) {
        return HandlerVerdict::NeedMore;
    }
    match protocol {
        ProtocolId::Tls => confirm_tls(staged, pkt),
        ProtocolId::Http => confirm_http(staged, pkt),
        ProtocolId::Unknown => HandlerVerdict::Rejected,
    }
}

/// Hellos and application data confirm TLS. Alerts and ChangeCipherSpec can
/// show up mid-stream on their own and are not conclusive.
pub fn confirm_tls<P: Packet + ?Sized>(staged: &PacketContext, pkt: &P) -> HandlerVerdict {
    if !is_tls(&staged.skb_info, pkt) {
        return HandlerVerdict::Rejected;
    }
    let Ok(record) = pkt.load::<TlsRecordHdr>(staged.skb_info.data_off as usize) else {
        return HandlerVerdict::Rejected;
    };
    match record.content_type {
        CONTENT_HANDSHAKE | CONTENT_APPLICATION_DATA => HandlerVerdict::Confirmed,
        _ => HandlerVerdict::NeedMore,
    }
}

pub fn confirm_http<P: Packet + ?Sized>(staged: &PacketContext, pkt: &P) -> HandlerVerdict {
    if is_http(&staged.skb_info, pkt) {
        HandlerVerdict::Confirmed
    } else {
        HandlerVerdict::Rejected
    }
}
