//! # Local Network Detection
//!
//! Works out which IPv4 network the host sits on, so a sweep can default to
//! "everything on my LAN" when no target is given.
//!
//! The primary address is the one the kernel would use for outbound traffic
//! (a connected UDP socket, no packet is sent). Its prefix comes from the
//! interface that carries it. Without a matching interface the block falls
//! back to a /24 around the address.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};

/// Prefix assumed when the interface mask cannot be found.
const FALLBACK_PREFIX: u8 = 24;

/// The host's primary IPv4 address and the block it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNetwork {
    pub address: Ipv4Addr,
    /// Normalized to the network address, e.g. `192.168.1.0/24`.
    pub network: Ipv4Network,
}

/// Detects the local IPv4 network, or `None` when the host has no usable
/// non-loopback IPv4 address.
pub fn local_network() -> Option<LocalNetwork> {
    let interfaces = datalink::interfaces();
    let nets: Vec<IpNetwork> = interfaces.iter().flat_map(|i| i.ips.clone()).collect();

    let address = primary_ipv4().or_else(|| first_lan_address(&interfaces))?;
    Some(network_of(address, nets))
}

/// Source address the kernel picks for a route to the public internet.
pub fn primary_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// First private IPv4 address on an interface that is up, for hosts without
/// a default route.
fn first_lan_address(interfaces: &[NetworkInterface]) -> Option<Ipv4Addr> {
    interfaces
        .iter()
        .filter(|i| i.is_up() && !i.is_loopback())
        .flat_map(|i| i.ips.iter())
        .find_map(|net| match net {
            IpNetwork::V4(v4) if v4.ip().is_private() => Some(v4.ip()),
            _ => None,
        })
}

/// The block `address` belongs to according to `nets`, or a /24 around it.
pub fn network_of(address: Ipv4Addr, nets: impl IntoIterator<Item = IpNetwork>) -> LocalNetwork {
    let prefix = nets
        .into_iter()
        .find_map(|net| match net {
            IpNetwork::V4(v4) if v4.ip() == address => Some(v4.prefix()),
            _ => None,
        })
        .unwrap_or(FALLBACK_PREFIX);

    LocalNetwork {
        address,
        network: normalized(address, prefix),
    }
}

fn normalized(address: Ipv4Addr, prefix: u8) -> Ipv4Network {
    let with_host_bits = Ipv4Network::new(address, prefix)
        .or_else(|_| Ipv4Network::new(address, FALLBACK_PREFIX))
        .unwrap_or_else(|_| Ipv4Network::from(address));
    Ipv4Network::new(with_host_bits.network(), with_host_bits.prefix()).unwrap_or(with_host_bits)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
