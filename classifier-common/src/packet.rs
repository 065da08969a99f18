//! Bounded packet reads and the tuple reader.

use core::mem;

use network_types::{
    eth::{EthHdr, EtherType},
    ip::{
        IpProto,
        ipv4::{self, Ipv4Hdr},
        ipv6::{self, Ipv6Hdr},
    },
    tcp::TcpHdr,
    udp::UdpHdr,
};

use crate::{CONN_TYPE_TCP, CONN_V6, PacketContext};

/// Read access to a frame that starts at its Ethernet header.
///
/// `load` copies `size_of::<T>()` bytes at `offset` or fails when they are not
/// all inside the frame. Callers only instantiate `T` with the byte-array header
/// types from `network_types`, for which every bit pattern is valid.
pub trait Packet {
    fn len(&self) -> usize;

    fn load<T: Copy>(&self, offset: usize) -> Result<T, ()>;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Packet for [u8] {
    #[inline]
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    #[inline]
    fn load<T: Copy>(&self, offset: usize) -> Result<T, ()> {
        let end = offset.checked_add(mem::size_of::<T>()).ok_or(())?;
        if end > <[u8]>::len(self) {
            return Err(());
        }
        // SAFETY: the range was bounds checked above and the read tolerates
        // any alignment.
        Ok(unsafe { core::ptr::read_unaligned(self.as_ptr().add(offset) as *const T) })
    }
}

// No 128-bit arithmetic here: the BPF backend cannot lower it.
#[inline(always)]
fn be_u64(bytes: &[u8; 16], at: usize) -> u64 {
    let mut value = 0u64;
    let mut i = 0;
    while i < 8 {
        value = (value << 8) | bytes[at + i] as u64;
        i += 1;
    }
    value
}

/// Parses Ethernet, IPv4/IPv6 and TCP/UDP headers into a packet context.
///
/// Returns `None` for anything the classifier ignores: other ether types,
/// IPv6 extension headers, non-initial IPv4 fragments, other transports and
/// truncated headers. The tuple comes back in wire direction, not normalized.
/// `cpu` and `protocol` are left for the caller to fill.
pub fn read_conn_tuple<P: Packet + ?Sized>(pkt: &P) -> Option<PacketContext> {
    let eth: EthHdr = pkt.load(0).ok()?;
    let mut offset = EthHdr::LEN;
    let mut ctx = PacketContext::default();

    // End of the IP datagram; anything past it is link-layer padding.
    let ip_end;
    let proto = match eth.ether_type() {
        Ok(EtherType::Ipv4) => {
            let ip: Ipv4Hdr = pkt.load(offset).ok()?;
            if ipv4::version(ip.vihl) != 4 {
                return None;
            }
            let ihl = ipv4::ihl(ip.vihl) as usize;
            if ihl < Ipv4Hdr::LEN {
                return None;
            }
            if ipv4::frag_offset(ip.frags) != 0 {
                return None;
            }
            ctx.tup.saddr_l = u32::from_be_bytes(ip.src_addr) as u64;
            ctx.tup.daddr_l = u32::from_be_bytes(ip.dst_addr) as u64;
            ip_end = offset + ipv4::tot_len(ip.tot_len) as usize;
            offset += ihl;
            ip.proto
        }
        Ok(EtherType::Ipv6) => {
            let ip: Ipv6Hdr = pkt.load(offset).ok()?;
            if ipv6::version(ip.vcf) != 6 {
                return None;
            }
            // Extension header chains are not walked.
            if IpProto::try_from_u8(ip.next_hdr).is_some_and(|p| p.is_ipv6_extension()) {
                return None;
            }
            ctx.tup.saddr_h = be_u64(&ip.src_addr, 0);
            ctx.tup.saddr_l = be_u64(&ip.src_addr, 8);
            ctx.tup.daddr_h = be_u64(&ip.dst_addr, 0);
            ctx.tup.daddr_l = be_u64(&ip.dst_addr, 8);
            ctx.tup.metadata |= CONN_V6;
            offset += Ipv6Hdr::LEN;
            ip_end = offset + ipv6::payload_len(ip.payload_len) as usize;
            ip.next_hdr
        }
        _ => return None,
    };

    match IpProto::try_from_u8(proto) {
        Some(IpProto::Tcp) => {
            let tcp: TcpHdr = pkt.load(offset).ok()?;
            let hdr_len = tcp.hdr_len();
            if hdr_len < TcpHdr::LEN {
                return None;
            }
            ctx.tup.sport = tcp.src_port();
            ctx.tup.dport = tcp.dst_port();
            ctx.tup.metadata |= CONN_TYPE_TCP;
            ctx.skb_info.tcp_seq = tcp.seq_num();
            ctx.skb_info.tcp_flags = tcp.flags();
            offset += hdr_len;
        }
        Some(IpProto::Udp) => {
            let udp: UdpHdr = pkt.load(offset).ok()?;
            ctx.tup.sport = udp.src_port();
            ctx.tup.dport = udp.dst_port();
            offset += UdpHdr::LEN;
        }
        _ => return None,
    }

    let frame_end = pkt.len();
    let data_end = if ip_end < frame_end { ip_end } else { frame_end };
    ctx.skb_info.data_off = offset as u32;
    ctx.skb_info.data_end = if data_end < offset { offset } else { data_end } as u32;
    Some(ctx)
}

/// Frame builders shared by the tests of this crate.
#[cfg(test)]
pub(crate) mod testing {
    use std::vec::Vec;

    use network_types::tcp::{TCP_FLAG_ACK, TCP_FLAG_PSH};

    pub const PSH_ACK: u8 = TCP_FLAG_PSH | TCP_FLAG_ACK;

    fn eth(ether_type: u16) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 2]); // dst mac
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]); // src mac
        frame.extend_from_slice(&ether_type.to_be_bytes());
        frame
    }

    fn tcp_hdr(sport: u16, dport: u16, flags: u8) -> [u8; 20] {
        let mut hdr = [0u8; 20];
        hdr[0..2].copy_from_slice(&sport.to_be_bytes());
        hdr[2..4].copy_from_slice(&dport.to_be_bytes());
        hdr[4..8].copy_from_slice(&1000u32.to_be_bytes());
        hdr[12] = 0x50; // data offset 5
        hdr[13] = flags;
        hdr[14..16].copy_from_slice(&64240u16.to_be_bytes());
        hdr
    }

    pub fn ipv4_tcp(
        src: [u8; 4],
        sport: u16,
        dst: [u8; 4],
        dport: u16,
        flags: u8,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut frame = eth(0x0800);
        let tot_len = (20 + 20 + payload.len()) as u16;
        frame.push(0x45);
        frame.push(0);
        frame.extend_from_slice(&tot_len.to_be_bytes());
        frame.extend_from_slice(&[0, 1, 0x40, 0]); // id, DF
        frame.push(64);
        frame.push(6);
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&dst);
        frame.extend_from_slice(&tcp_hdr(sport, dport, flags));
        frame.extend_from_slice(payload);
        frame
    }

    pub fn ipv6_tcp(
        src: [u8; 16],
        sport: u16,
        dst: [u8; 16],
        dport: u16,
        flags: u8,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut frame = eth(0x86DD);
        frame.extend_from_slice(&[0x60, 0, 0, 0]);
        frame.extend_from_slice(&((20 + payload.len()) as u16).to_be_bytes());
        frame.push(6);
        frame.push(64);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&dst);
        frame.extend_from_slice(&tcp_hdr(sport, dport, flags));
        frame.extend_from_slice(payload);
        frame
    }

    pub fn ipv4_udp(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = eth(0x0800);
        let tot_len = (20 + 8 + payload.len()) as u16;
        frame.push(0x45);
        frame.push(0);
        frame.extend_from_slice(&tot_len.to_be_bytes());
        frame.extend_from_slice(&[0, 1, 0, 0]);
        frame.push(64);
        frame.push(17);
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&dst);
        frame.extend_from_slice(&sport.to_be_bytes());
        frame.extend_from_slice(&dport.to_be_bytes());
        frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(payload);
        frame
    }

    pub fn arp() -> Vec<u8> {
        let mut frame = eth(0x0806);
        frame.extend_from_slice(&[0u8; 28]);
        frame
    }

    /// TLS 1.2 ClientHello record header plus handshake prefix; the body is
    /// zero-filled to the advertised length.
    pub fn client_hello() -> Vec<u8> {
        let body_len: usize = 508;
        let mut rec = Vec::new();
        rec.push(0x16);
        rec.extend_from_slice(&[0x03, 0x01]);
        rec.extend_from_slice(&((body_len + 4) as u16).to_be_bytes());
        rec.push(0x01);
        rec.extend_from_slice(&(body_len as u32).to_be_bytes()[1..]);
        rec.extend_from_slice(&[0x03, 0x03]);
        rec.resize(5 + 4 + body_len, 0);
        rec
    }
}

#[cfg(test)]
mod tests {
    use network_types::tcp::{TCP_FLAG_ACK, TCP_FLAG_FIN};

    use super::{testing::*, *};
    use crate::tuple::normalized;

    #[test]
    fn test_slice_load_bounds() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(data[..].load::<[u8; 2]>(2), Ok([3, 4]));
        assert_eq!(data[..].load::<[u8; 2]>(3), Err(()));
        assert_eq!(data[..].load::<[u8; 1]>(usize::MAX), Err(()));
        assert!(!Packet::is_empty(&data[..]));
    }

    #[test]
    fn test_reads_ipv4_tcp_tuple() {
        let payload = b"GET / HTTP/1.1\r\n";
        let frame = ipv4_tcp([10, 0, 0, 1], 443, [10, 0, 0, 2], 51000, PSH_ACK, payload);
        let ctx = read_conn_tuple(&frame[..]).expect("tcp frame parses");

        assert!(ctx.tup.is_tcp());
        assert!(!ctx.tup.is_ipv6());
        assert_eq!(ctx.tup.saddr_l, 0x0A00_0001);
        assert_eq!(ctx.tup.daddr_l, 0x0A00_0002);
        assert_eq!(ctx.tup.sport, 443);
        assert_eq!(ctx.tup.dport, 51000);
        assert_eq!(ctx.skb_info.data_off, 54);
        assert_eq!(ctx.skb_info.payload_len() as usize, payload.len());
        assert_eq!(ctx.skb_info.tcp_seq, 1000);
        assert_eq!(ctx.skb_info.tcp_flags, PSH_ACK);
    }

    #[test]
    fn test_reads_ipv6_tcp_tuple() {
        let mut src = [0u8; 16];
        src[0] = 0xfd;
        src[15] = 1;
        let mut dst = src;
        dst[15] = 2;
        let frame = ipv6_tcp(src, 8443, dst, 40000, TCP_FLAG_FIN | TCP_FLAG_ACK, &[]);
        let ctx = read_conn_tuple(&frame[..]).expect("ipv6 frame parses");

        assert!(ctx.tup.is_ipv6());
        assert!(ctx.tup.is_tcp());
        assert_eq!(ctx.tup.saddr_h, 0xfd00_0000_0000_0000);
        assert_eq!(ctx.tup.saddr_l, 1);
        assert_eq!(ctx.tup.daddr_l, 2);
        assert_eq!(ctx.skb_info.data_off, 14 + 40 + 20);
        assert_eq!(ctx.skb_info.payload_len(), 0);
        assert!(ctx.skb_info.fin());
    }

    #[test]
    fn test_ignores_ipv6_extension_headers() {
        let mut src = [0u8; 16];
        src[15] = 1;
        let mut dst = src;
        dst[15] = 2;
        // Hop-by-hop options, routing, fragment and destination options.
        for next_hdr in [0u8, 43, 44, 60] {
            let mut frame = ipv6_tcp(src, 443, dst, 51000, TCP_FLAG_ACK, b"x");
            frame[EthHdr::LEN + 6] = next_hdr;
            assert!(read_conn_tuple(&frame[..]).is_none(), "next header {next_hdr}");
        }
    }

    #[test]
    fn test_reads_udp_without_tcp_bit() {
        let frame = ipv4_udp([10, 0, 0, 1], 5353, [224, 0, 0, 251], 5353, &[0u8; 12]);
        let ctx = read_conn_tuple(&frame[..]).expect("udp frame parses");
        assert!(!ctx.tup.is_tcp());
        assert_eq!(ctx.skb_info.data_off, 14 + 20 + 8);
    }

    #[test]
    fn test_ignores_non_ip_and_truncated_frames() {
        assert!(read_conn_tuple(&arp()[..]).is_none());

        let frame = ipv4_tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 2, TCP_FLAG_ACK, &[]);
        assert!(read_conn_tuple(&frame[..frame.len() - 1]).is_none());
        assert!(read_conn_tuple(&frame[..10]).is_none());
    }

    #[test]
    fn test_ignores_non_initial_fragment() {
        let mut frame = ipv4_tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 2, TCP_FLAG_ACK, b"x");
        // fragment offset 185 (x8 bytes), MF clear
        frame[20] = 0x00;
        frame[21] = 0xB9;
        assert!(read_conn_tuple(&frame[..]).is_none());
    }

    #[test]
    fn test_link_padding_is_not_payload() {
        let mut frame = ipv4_tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 2, TCP_FLAG_ACK, &[]);
        frame.resize(60, 0); // minimum Ethernet frame
        let ctx = read_conn_tuple(&frame[..]).expect("padded frame parses");
        assert_eq!(ctx.skb_info.payload_len(), 0);
    }

    #[test]
    fn test_both_directions_share_key() {
        let fwd = ipv4_tcp([10, 0, 0, 1], 443, [10, 0, 0, 2], 51000, TCP_FLAG_ACK, &[]);
        let rev = ipv4_tcp([10, 0, 0, 2], 51000, [10, 0, 0, 1], 443, TCP_FLAG_ACK, &[]);
        let a = read_conn_tuple(&fwd[..]).expect("parses").tup;
        let b = read_conn_tuple(&rev[..]).expect("parses").tup;
        assert_ne!(a, b);
        assert_eq!(normalized(a), normalized(b));
    }
}
