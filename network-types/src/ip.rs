//! ## IP Headers
//!
//! IPv4 header, which is present after the Ethernet header.
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |ip_ver | h_len |  ip_dscp  |ecn|        ip_total_length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       ip_identification       |flags|   ip_fragment_offset    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    ip_ttl     |  ip_protocol  |          ip_checksum          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         source_ipaddr                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      destination_ipaddr                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          ip_options                           |
//! /                              ...                              /
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!
//! IPv6 header, which is present after the Ethernet header.
//!   0                   1                   2                   3
//!   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |ip_ver |  ip_dscp  |ecn|             ip_flow_label             |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |       ip_payload_length       |ip_next_header | ip_hop_limit  |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                         source_ipaddr                         |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                     source_ipaddr (con't)                     |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                     source_ipaddr (con't)                     |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                     source_ipaddr (con't)                     |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                      destination_ipaddr                       |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                  destination_ipaddr (con't)                   |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                  destination_ipaddr (con't)                   |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                  destination_ipaddr (con't)                   |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

pub mod ipv4 {
    /// The length of the IPv4 header without options.
    pub const IPV4_LEN: usize = 20;

    pub type Vihl = u8;
    pub type DscpEcn = u8;
    pub type TotalLen = [u8; 2];
    pub type Identification = [u8; 2];
    pub type Fragment = [u8; 2];
    pub type Ttl = u8;
    /// Raw protocol number; decode with [`crate::ip::IpProto::try_from_u8`].
    pub type Protocol = u8;
    pub type Checksum = [u8; 2];
    pub type SrcAddr = [u8; 4];
    pub type DstAddr = [u8; 4];

    /// Fixed 20-byte IPv4 header. Options, if any, follow at `ihl(vihl)`.
    #[repr(C)]
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
    pub struct Ipv4Hdr {
        pub vihl: Vihl,
        pub dscp_ecn: DscpEcn,
        pub tot_len: TotalLen,
        pub id: Identification,
        pub frags: Fragment,
        pub ttl: Ttl,
        pub proto: Protocol,
        pub check: Checksum,
        pub src_addr: SrcAddr,
        pub dst_addr: DstAddr,
    }

    impl Ipv4Hdr {
        pub const LEN: usize = IPV4_LEN;
    }

    /// Returns the IP version field (should be 4).
    #[inline]
    pub fn version(vihl: Vihl) -> u8 {
        (vihl >> 4) & 0xF
    }

    /// Returns the IP header length in bytes.
    #[inline]
    pub fn ihl(vihl: Vihl) -> u8 {
        (vihl & 0xF) << 2
    }

    /// Returns the total length of the IP packet.
    #[inline]
    pub fn tot_len(total_len: TotalLen) -> u16 {
        u16::from_be_bytes(total_len)
    }

    /// Returns the fragmentation offset (13 bits).
    #[inline]
    pub fn frag_offset(fragments: Fragment) -> u16 {
        u16::from_be_bytes(fragments) & 0x1FFF
    }
}

pub mod ipv6 {
    /// The length of the IPv6 header.
    pub const IPV6_LEN: usize = 40;

    pub type Vcf = [u8; 4];
    pub type PayloadLen = [u8; 2];
    /// Raw next-header number; decode with [`crate::ip::IpProto::try_from_u8`].
    pub type NextHdr = u8;
    pub type HopLimit = u8;
    pub type SrcAddr = [u8; 16];
    pub type DstAddr = [u8; 16];

    /// Fixed 40-byte IPv6 header.
    #[repr(C)]
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
    pub struct Ipv6Hdr {
        pub vcf: Vcf,
        pub payload_len: PayloadLen,
        pub next_hdr: NextHdr,
        pub hop_limit: HopLimit,
        pub src_addr: SrcAddr,
        pub dst_addr: DstAddr,
    }

    impl Ipv6Hdr {
        pub const LEN: usize = IPV6_LEN;
    }

    /// Returns the IP version field (should be 6).
    #[inline]
    pub fn version(vcf: Vcf) -> u8 {
        (vcf[0] >> 4) & 0xF
    }

    /// Returns the payload length.
    #[inline]
    pub fn payload_len(payload_len: PayloadLen) -> u16 {
        u16::from_be_bytes(payload_len)
    }
}

/// Protocol which is encapsulated in the IP packet.
/// Only the numbers the tuple reader distinguishes are named here; everything
/// else is reported as unsupported.
/// <https://www.iana.org/assignments/protocol-numbers/protocol-numbers.xhtml>
#[repr(u8)]
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub enum IpProto {
    /// IPv6 Hop-by-Hop Option
    HopOpt = 0,
    /// Internet Control Message
    Icmp = 1,
    /// Transmission Control
    #[default]
    Tcp = 6,
    /// User Datagram
    Udp = 17,
    /// Routing Header for IPv6
    Ipv6Route = 43,
    /// Fragment Header for IPv6
    Ipv6Frag = 44,
    /// Encap Security Payload
    Esp = 50,
    /// Authentication Header
    Ah = 51,
    /// ICMP for IPv6
    Ipv6Icmp = 58,
    /// No Next Header for IPv6
    Ipv6NoNxt = 59,
    /// Destination Options for IPv6
    Ipv6Opts = 60,
    /// Stream Control Transmission Protocol
    Sctp = 132,
}

impl IpProto {
    /// Returns the string representation of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            IpProto::HopOpt => "hopopt",
            IpProto::Icmp => "icmp",
            IpProto::Tcp => "tcp",
            IpProto::Udp => "udp",
            IpProto::Ipv6Route => "ipv6-route",
            IpProto::Ipv6Frag => "ipv6-frag",
            IpProto::Esp => "esp",
            IpProto::Ah => "ah",
            IpProto::Ipv6Icmp => "ipv6-icmp",
            IpProto::Ipv6NoNxt => "ipv6-nonxt",
            IpProto::Ipv6Opts => "ipv6-opts",
            IpProto::Sctp => "sctp",
        }
    }

    /// Try to create an IpProto from a u8 value
    pub fn try_from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(IpProto::HopOpt),
            1 => Some(IpProto::Icmp),
            6 => Some(IpProto::Tcp),
            17 => Some(IpProto::Udp),
            43 => Some(IpProto::Ipv6Route),
            44 => Some(IpProto::Ipv6Frag),
            50 => Some(IpProto::Esp),
            51 => Some(IpProto::Ah),
            58 => Some(IpProto::Ipv6Icmp),
            59 => Some(IpProto::Ipv6NoNxt),
            60 => Some(IpProto::Ipv6Opts),
            132 => Some(IpProto::Sctp),
            _ => None,
        }
    }

    /// True for IPv6 extension headers, which the tuple reader does not walk.
    #[inline]
    pub fn is_ipv6_extension(&self) -> bool {
        matches!(
            self,
            IpProto::HopOpt
                | IpProto::Ipv6Route
                | IpProto::Ipv6Frag
                | IpProto::Esp
                | IpProto::Ah
                | IpProto::Ipv6Opts
        )
    }
}
