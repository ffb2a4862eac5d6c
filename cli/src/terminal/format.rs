use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use colored::*;
use netsweep_common::network::host::HostRecord;

use crate::terminal::colors;

pub type Detail = (String, ColoredString);

pub fn ipv6_to_type_str(ipv6_addr: &Ipv6Addr) -> &'static str {
    if is_global_unicast(ipv6_addr) {
        return "GUA";
    }
    if ipv6_addr.is_unique_local() {
        return "ULA";
    }
    if ipv6_addr.is_unicast_link_local() {
        return "LLA";
    }
    "IPv6"
}

/// 2000::/3
fn is_global_unicast(ipv6_addr: &Ipv6Addr) -> bool {
    ipv6_addr.segments()[0] & 0xe000 == 0x2000
}

pub fn ip_to_detail(ip: &IpAddr) -> Detail {
    match ip {
        IpAddr::V4(ipv4_addr) => (
            String::from("IPv4"),
            ipv4_addr.to_string().color(colors::IPV4_ADDR),
        ),
        IpAddr::V6(ipv6_addr) => (
            String::from(ipv6_to_type_str(ipv6_addr)),
            ipv6_addr.to_string().color(colors::IPV6_ADDR),
        ),
    }
}

pub fn latency_to_detail(latency_ms: Option<f64>) -> Option<Detail> {
    latency_ms.map(|ms| {
        (
            String::from("Latency"),
            format!("{ms:.2} ms").color(colors::LATENCY),
        )
    })
}

pub fn mac_to_detail(mac: &Option<String>) -> Option<Detail> {
    mac.as_ref()
        .map(|mac| (String::from("MAC"), mac.color(colors::MAC_ADDR)))
}

pub fn ports_to_detail(ports: &[u16]) -> Detail {
    let value = if ports.is_empty() {
        "none open".dimmed()
    } else {
        ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
            .color(colors::PORT)
    };
    (String::from("Ports"), value)
}

pub fn host_details(record: &HostRecord) -> Vec<Detail> {
    let mut details = vec![ip_to_detail(&record.address)];
    details.extend(latency_to_detail(record.latency_ms));
    details.extend(mac_to_detail(&record.mac));
    details
}

/// Compact age: `42s`, `5m`, `3h`.
pub fn age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3_600 => format!("{}m", secs / 60),
        _ => format!("{}h", secs / 3_600),
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
