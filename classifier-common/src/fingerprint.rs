//! Protocol fingerprint rules.
//!
//! Each rule looks at a fixed prefix of the current packet's payload and nothing
//! else: no state is kept between packets and no rule reads more than a dozen
//! bytes. Rules run in [`ProtocolId::KNOWN`] order and the first match wins.

use network_types::{
    http::{self, HTTP_PREFIX_LEN, HttpPrefix},
    tls::{self, CONTENT_HANDSHAKE, TLS_MAX_RECORD, TlsHandshakeHdr, TlsRecordHdr},
};

use crate::{ConnTuple, Packet, ProtocolId, SkbInfo};

/// Returns the first protocol whose rule matches, or `ProtocolId::Unknown`.
///
/// The tuple is accepted so that port-aware rules can be added without changing
/// callers; none of the current rules consult it.
#[inline]
pub fn fingerprint<P: Packet + ?Sized>(
    _tup: &ConnTuple,
    skb_info: &SkbInfo,
    pkt: &P,
) -> ProtocolId {
    if skb_info.payload_len() == 0 {
        return ProtocolId::Unknown;
    }
    if is_tls(skb_info, pkt) {
        return ProtocolId::Tls;
    }
    if is_http(skb_info, pkt) {
        return ProtocolId::Http;
    }
    ProtocolId::Unknown
}

/// Matches the start of a TLS record.
///
/// Handshake records must carry a ClientHello or ServerHello whose length is
/// consistent with the record. Any other record type must fit in the payload.
pub fn is_tls<P: Packet + ?Sized>(skb_info: &SkbInfo, pkt: &P) -> bool {
    let payload = skb_info.payload_len();
    if (payload as usize) < TlsRecordHdr::LEN {
        return false;
    }
    let offset = skb_info.data_off as usize;
    let Ok(record) = pkt.load::<TlsRecordHdr>(offset) else {
        return false;
    };

    if !tls::is_known_content_type(record.content_type)
        || !tls::is_valid_version(record.version())
    {
        return false;
    }
    let record_len = record.len();
    if record.is_empty() || record_len > TLS_MAX_RECORD {
        return false;
    }

    if record.content_type == CONTENT_HANDSHAKE {
        let Ok(handshake) = pkt.load::<TlsHandshakeHdr>(offset + TlsRecordHdr::LEN) else {
            return false;
        };
        // 4 bytes of msg_type + length precede the handshake body
        return handshake.is_hello()
            && handshake.len() + 4 <= record_len as u32
            && tls::is_valid_version(handshake.hello_version());
    }

    TlsRecordHdr::LEN as u32 + record_len as u32 <= payload
}

/// Matches an HTTP/1.x request line or status line.
pub fn is_http<P: Packet + ?Sized>(skb_info: &SkbInfo, pkt: &P) -> bool {
    if (skb_info.payload_len() as usize) < HTTP_PREFIX_LEN {
        return false;
    }
    let Ok(prefix) = pkt.load::<HttpPrefix>(skb_info.data_off as usize) else {
        return false;
    };
    http::is_request(&prefix) || http::is_response(&prefix)
}
