//! TCP header, which is present after the IP header.
//!    0                   1                   2                   3
//!    0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |          Source Port          |       Destination Port        |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |                        Sequence Number                        |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |                    Acknowledgment Number                      |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |  Data |     |N|C|E|U|A|P|R|S|F|                               |
//!   | Offset| Rsrv|S|R|C|R|C|S|S|Y|I|            Window             |
//!   |       |     | |W|E|G|K|H|T|N|N|                               |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |           Checksum            |         Urgent Pointer        |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |                            Options                            |
//!   /                              ...                              /
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |                            Padding                            |
//!   /                              ...                              /
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |                             data                              |
//!   /                              ...                              /
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!
//! [`TcpHdr`] represents the Transmission Control Protocol (TCP) header as defined in RFC 793.
//! The TCP header is 20 bytes long (without options) and contains various fields for connection
//! management, flow control, and reliability.
//! All fields are stored in network byte order (big-endian).

/// The length of the TCP header base structure.
pub const TCP_LEN: usize = 20;

/// Source port field (16 bits).
pub type SrcPort = [u8; 2];
/// Destination port field (16 bits).
pub type DstPort = [u8; 2];
/// Sequence number field (32 bits).
pub type SeqNum = [u8; 4];
/// Acknowledgment sequence number field (32 bits).
pub type AckSeq = [u8; 4];
/// Combined field: Data offset (4 bits), Reserved (3 bits), Flags (9 bits).
pub type OffResFlags = [u8; 2];
/// Window size field (16 bits).
pub type Window = [u8; 2];
/// Checksum field (16 bits).
pub type Checksum = [u8; 2];
/// Urgent pointer field (16 bits).
pub type UrgPtr = [u8; 2];

/// TCP flag masks
pub const TCP_FLAG_FIN: u8 = 0x01;
pub const TCP_FLAG_PSH: u8 = 0x08;
pub const TCP_FLAG_ACK: u8 = 0x10;

/// The 20-byte base TCP header.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TcpHdr {
    pub src: SrcPort,
    pub dst: DstPort,
    pub seq: SeqNum,
    pub ack_seq: AckSeq,
    pub off_res_flags: OffResFlags,
    pub window: Window,
    pub check: Checksum,
    pub urg_ptr: UrgPtr,
}

impl TcpHdr {
    pub const LEN: usize = TCP_LEN;

    #[inline]
    pub fn src_port(&self) -> u16 {
        src_port(self.src)
    }

    #[inline]
    pub fn dst_port(&self) -> u16 {
        dst_port(self.dst)
    }

    #[inline]
    pub fn seq_num(&self) -> u32 {
        seq_num(self.seq)
    }

    /// Header length in bytes including options.
    #[inline]
    pub fn hdr_len(&self) -> usize {
        hdr_len(self.off_res_flags)
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        tcp_flags(self.off_res_flags)
    }
}

/// Returns the source port from network byte order.
#[inline]
pub fn src_port(src: SrcPort) -> u16 {
    u16::from_be_bytes(src)
}

/// Returns the destination port from network byte order.
#[inline]
pub fn dst_port(dst: DstPort) -> u16 {
    u16::from_be_bytes(dst)
}

/// Returns the sequence number from network byte order.
#[inline]
pub fn seq_num(seq: SeqNum) -> u32 {
    u32::from_be_bytes(seq)
}

/// Returns the data offset value (header length in 32-bit words).
#[inline]
pub fn data_offset(off_res_flags: OffResFlags) -> u8 {
    (off_res_flags[0] >> 4) & 0x0F
}

/// Returns the header length in bytes.
#[inline]
pub fn hdr_len(off_res_flags: OffResFlags) -> usize {
    (data_offset(off_res_flags) as usize) * 4
}

/// Returns the TCP flags.
#[inline]
pub fn tcp_flags(off_res_flags: OffResFlags) -> u8 {
    off_res_flags[1]
}

/// Returns true if the FIN flag is set in a raw flags byte.
#[inline]
pub fn fin_flag(flags: u8) -> bool {
    (flags & TCP_FLAG_FIN) != 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tcp_len_constant() {
        assert_eq!(TCP_LEN, 20);
        assert_eq!(core::mem::size_of::<TcpHdr>(), TCP_LEN);
        assert_eq!(core::mem::align_of::<TcpHdr>(), 1);
    }

    #[test]
    fn test_flag_masks() {
        assert_eq!(TCP_FLAG_FIN, 0x01);
        assert_eq!(TCP_FLAG_PSH, 0x08);
        assert_eq!(TCP_FLAG_ACK, 0x10);
    }

    #[test]
    fn test_ports() {
        assert_eq!(src_port([0x12, 0x34]), 0x1234);
        assert_eq!(src_port([0x01, 0xBB]), 443);
        assert_eq!(dst_port([0xC7, 0x38]), 51000);
        assert_eq!(dst_port([0xFF, 0xFF]), u16::MAX);
    }

    #[test]
    fn test_seq_num() {
        assert_eq!(seq_num([0x12, 0x34, 0x56, 0x78]), 0x12345678);
        assert_eq!(seq_num([0xFF, 0xFF, 0xFF, 0xFF]), u32::MAX);
    }

    #[test]
    fn test_data_offset() {
        // Data offset 5 (minimum valid - 20 bytes header)
        assert_eq!(data_offset([0x50, 0x00]), 5);
        // Data offset 15 (maximum - 60 bytes header)
        assert_eq!(data_offset([0xF0, 0x00]), 15);
        // Data offset with flags set
        assert_eq!(data_offset([0x50, 0xFF]), 5);
    }

    #[test]
    fn test_hdr_len() {
        assert_eq!(hdr_len([0x50, 0x00]), 20);
        assert_eq!(hdr_len([0x80, 0x00]), 32); // timestamps option
        assert_eq!(hdr_len([0xF0, 0x00]), 60);
    }

    #[test]
    fn test_flags() {
        assert_eq!(tcp_flags([0x50, 0x12]), 0x12); // SYN+ACK
        assert!(fin_flag(0x11));
        assert!(!fin_flag(0x10));
    }

    #[test]
    fn test_hdr_accessors() {
        let hdr = TcpHdr {
            src: [0x01, 0xBB],
            dst: [0xC7, 0x38],
            seq: [0, 0, 0x10, 0],
            off_res_flags: [0x50, TCP_FLAG_PSH | TCP_FLAG_ACK],
            ..Default::default()
        };
        assert_eq!(hdr.src_port(), 443);
        assert_eq!(hdr.dst_port(), 51000);
        assert_eq!(hdr.seq_num(), 4096);
        assert_eq!(hdr.hdr_len(), 20);
        assert_eq!(hdr.flags(), 0x18);
    }
}
