//! Direction-independent connection keys.

use core::{
    cmp::Ordering,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use crate::{CONN_TYPE_TCP, CONN_V6, ConnTuple};

/// Splits an address into the (high, low) halves stored in a tuple.
#[inline]
pub fn split_addr(addr: IpAddr) -> (u64, u64) {
    match addr {
        IpAddr::V4(v4) => (0, u32::from(v4) as u64),
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            ((bits >> 64) as u64, bits as u64)
        }
    }
}

#[inline]
fn join_addr(high: u64, low: u64, v6: bool) -> IpAddr {
    if v6 {
        IpAddr::V6(Ipv6Addr::from(((high as u128) << 64) | low as u128))
    } else {
        IpAddr::V4(Ipv4Addr::from(low as u32))
    }
}

impl ConnTuple {
    /// Builds a TCP tuple from two socket addresses of the same family.
    pub fn tcp(src: SocketAddr, dst: SocketAddr) -> Self {
        let (saddr_h, saddr_l) = split_addr(src.ip());
        let (daddr_h, daddr_l) = split_addr(dst.ip());
        let mut metadata = CONN_TYPE_TCP;
        if src.is_ipv6() {
            metadata |= CONN_V6;
        }
        ConnTuple {
            saddr_h,
            saddr_l,
            daddr_h,
            daddr_l,
            sport: src.port(),
            dport: dst.port(),
            metadata,
            ..Default::default()
        }
    }

    pub fn src(&self) -> SocketAddr {
        SocketAddr::new(
            join_addr(self.saddr_h, self.saddr_l, self.is_ipv6()),
            self.sport,
        )
    }

    pub fn dst(&self) -> SocketAddr {
        SocketAddr::new(
            join_addr(self.daddr_h, self.daddr_l, self.is_ipv6()),
            self.dport,
        )
    }

    /// The same connection seen from the other endpoint.
    #[inline]
    pub fn reversed(&self) -> Self {
        ConnTuple {
            saddr_h: self.daddr_h,
            saddr_l: self.daddr_l,
            daddr_h: self.saddr_h,
            daddr_l: self.saddr_l,
            sport: self.dport,
            dport: self.sport,
            ..*self
        }
    }

    /// Lexicographic order of (address, port) between the two endpoints.
    #[inline]
    fn endpoint_order(&self) -> Ordering {
        (self.saddr_h, self.saddr_l, self.sport).cmp(&(self.daddr_h, self.daddr_l, self.dport))
    }

    /// Whether the tuple is already in canonical orientation.
    #[inline]
    pub fn is_normalized(&self) -> bool {
        self.endpoint_order() != Ordering::Greater
    }
}

/// Rewrites `tup` in place so the smaller (address, port) endpoint is the source.
///
/// `normalize(t)` and `normalize(t.reversed())` always agree, which is what lets
/// both directions of a flow share one in-flight entry.
#[inline]
pub fn normalize(tup: &mut ConnTuple) {
    if !tup.is_normalized() {
        *tup = tup.reversed();
    }
}

/// By-value convenience over [`normalize`].
#[inline]
pub fn normalized(mut tup: ConnTuple) -> ConnTuple {
    normalize(&mut tup);
    tup
}
