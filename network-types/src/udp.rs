//! UDP header, which is present after the IP header.
//!
//!   0                   1                   2                   3
//!   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |          Source Port          |       Destination Port        |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |          PDU Length           |           Checksum            |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                             data                              |
//!  /                              ...                              /
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! [`UdpHdr`] represents the User Datagram Protocol (UDP) header as defined in RFC 768.
//! The UDP header is 8 bytes long and contains source and destination ports, length, and checksum fields.
//! All fields are stored in network byte order (big-endian).

pub const UDP_LEN: usize = 8;

/// Source port field (16 bits).
pub type SrcPort = [u8; 2];
/// Destination port field (16 bits).
pub type DstPort = [u8; 2];
/// Length field (16 bits).
pub type Len = [u8; 2];
/// Checksum field (16 bits).
pub type Checksum = [u8; 2];

/// The 8-byte UDP header.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct UdpHdr {
    pub src: SrcPort,
    pub dst: DstPort,
    pub len: Len,
    pub check: Checksum,
}

impl UdpHdr {
    pub const LEN: usize = UDP_LEN;

    #[inline]
    pub fn src_port(&self) -> u16 {
        src_port(self.src)
    }

    #[inline]
    pub fn dst_port(&self) -> u16 {
        dst_port(self.dst)
    }
}

/// Returns the source port number.
///
/// This method converts the source port from network byte order (big-endian)
/// to host byte order.
///
/// # Returns
/// The source port as a u16 value.
#[inline]
pub fn src_port(src: SrcPort) -> u16 {
    u16::from_be_bytes(src)
}

/// Returns the destination port number.
///
/// This method converts the destination port from network byte order (big-endian)
/// to host byte order.
///
/// # Returns
/// The destination port as a u16 value.
#[inline]
pub fn dst_port(dst: DstPort) -> u16 {
    u16::from_be_bytes(dst)
}
