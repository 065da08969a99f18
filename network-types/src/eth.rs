/// Ethernet header structure that appears at the beginning of every Ethernet frame.
///
/// This structure represents the standard IEEE 802.3 Ethernet header format.
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  |                     destination_mac_addr                      |
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  | destination_mac_addr (con't)  |        source_mac_addr        |
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  |                    source_mac_addr (con't)                    |
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  |           eth_type            |
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// The length of the Ethernet header.
pub const ETH_LEN: usize = 14;

/// Destination MAC address.
pub type DstMacAddr = [u8; 6];

/// Source MAC address.
pub type SrcMacAddr = [u8; 6];

/// EtherType field, network byte order.
pub type EtherTypeField = [u8; 2];

/// Fixed part of an Ethernet II frame, loadable straight out of a packet buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct EthHdr {
    pub dst_addr: DstMacAddr,
    pub src_addr: SrcMacAddr,
    pub ether_type: EtherTypeField,
}

impl EthHdr {
    pub const LEN: usize = ETH_LEN;

    /// Decodes the EtherType, handing back the raw host-order value when unknown.
    #[inline]
    pub fn ether_type(&self) -> Result<EtherType, u16> {
        EtherType::try_from(u16::from_be_bytes(self.ether_type))
    }
}

/// Protocol which is encapsulated in the payload of the Ethernet frame.
/// Discriminants are the host-order IEEE assigned numbers.
#[repr(u16)]
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
pub enum EtherType {
    #[default]
    Ipv4 = 0x0800,
    Arp = 0x0806,
    Ieee8021q = 0x8100,
    Ipv6 = 0x86DD,
    Ieee8021ad = 0x88A8,
}

impl TryFrom<u16> for EtherType {
    type Error = u16; // Return the unknown value itself as the error

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0800 => Ok(EtherType::Ipv4),
            0x0806 => Ok(EtherType::Arp),
            0x8100 => Ok(EtherType::Ieee8021q),
            0x86DD => Ok(EtherType::Ipv6),
            0x88A8 => Ok(EtherType::Ieee8021ad),
            _ => Err(value),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(ether_type: EtherType) -> Self {
        ether_type as u16
    }
}

impl EtherType {
    /// Returns a human-readable string representation of the EtherType.
    ///
    /// # Examples
    /// ```
    /// # use network_types::eth::EtherType;
    /// assert_eq!(EtherType::Ipv4.as_str(), "ipv4");
    /// assert_eq!(EtherType::Ieee8021q.as_str(), "vlan");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            EtherType::Ipv4 => "ipv4",
            EtherType::Arp => "arp",
            EtherType::Ieee8021q => "vlan",
            EtherType::Ipv6 => "ipv6",
            EtherType::Ieee8021ad => "qinq",
        }
    }
}
