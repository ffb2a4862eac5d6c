//! # Address Ranges
//!
//! Continuous, inclusive address ranges and the host span of a CIDR block.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use pnet::ipnetwork::IpNetwork;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    /// Builds a range with the smaller endpoint first.
    pub fn ordered(a: Ipv4Addr, b: Ipv4Addr) -> Self {
        if u32::from(b) < u32::from(a) {
            Self::new(b, a)
        } else {
            Self::new(a, b)
        }
    }

    pub fn len(&self) -> u128 {
        let start = u32::from(self.start_addr) as u128;
        let end = u32::from(self.end_addr) as u128;
        if end < start { 0 } else { end - start + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Ipv4Addr> + Clone {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }

    pub fn to_iter(&self) -> impl Iterator<Item = IpAddr> {
        self.iter().map(IpAddr::V4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Range {
    pub start_addr: Ipv6Addr,
    pub end_addr: Ipv6Addr,
}

impl Ipv6Range {
    pub fn new(start_addr: Ipv6Addr, end_addr: Ipv6Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn len(&self) -> u128 {
        let start = u128::from(self.start_addr);
        let end = u128::from(self.end_addr);
        if end < start {
            0
        } else {
            (end - start).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_iter(&self) -> impl Iterator<Item = IpAddr> {
        let start: u128 = self.start_addr.into();
        let end: u128 = self.end_addr.into();
        (start..=end).map(|ip| IpAddr::V6(Ipv6Addr::from(ip)))
    }
}

/// Host addresses of a CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSpan {
    V4(Ipv4Range),
    V6(Ipv6Range),
}

impl HostSpan {
    pub fn len(&self) -> u128 {
        match self {
            HostSpan::V4(range) => range.len(),
            HostSpan::V6(range) => range.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_iter(&self) -> Box<dyn Iterator<Item = IpAddr> + '_> {
        match self {
            HostSpan::V4(range) => Box::new(range.to_iter()),
            HostSpan::V6(range) => Box::new(range.to_iter()),
        }
    }
}

/// Usable hosts of `network`.
///
/// Network and broadcast addresses are dropped for IPv4 blocks larger than /31;
/// IPv6 blocks larger than /127 drop the subnet-router anycast address. Point
/// to point (/31, /127) and single-address blocks keep every address.
pub fn usable_hosts(network: IpNetwork) -> HostSpan {
    match network {
        IpNetwork::V4(net) => {
            let first = u32::from(net.network());
            let last = u32::from(net.broadcast());
            if net.prefix() >= 31 {
                HostSpan::V4(Ipv4Range::new(first.into(), last.into()))
            } else {
                HostSpan::V4(Ipv4Range::new((first + 1).into(), (last - 1).into()))
            }
        }
        IpNetwork::V6(net) => {
            let first = u128::from(net.network());
            let host_bits = 128 - u32::from(net.prefix());
            let mask = if host_bits == 128 {
                u128::MAX
            } else {
                (1u128 << host_bits) - 1
            };
            let last = first | mask;
            if net.prefix() >= 127 {
                HostSpan::V6(Ipv6Range::new(first.into(), last.into()))
            } else {
                HostSpan::V6(Ipv6Range::new((first + 1).into(), last.into()))
            }
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
