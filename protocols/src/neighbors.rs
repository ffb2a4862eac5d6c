//! # Neighbor Table Parsing
//!
//! Reads the address to MAC mapping out of `ip neigh` (Linux) and `arp -an`
//! (macOS, BSD and Linux net-tools).

use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;

use pnet::util::MacAddr;
use regex::Regex;

static ARP_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([0-9a-fA-F.:]+)\)\s+at\s+([0-9a-fA-F:]{11,17})").expect("valid arp regex")
});

/// Parses `ip neigh` output: `192.168.1.1 dev wlan0 lladdr a4:5e:60:01:02:03 REACHABLE`.
pub fn parse_ip_neigh(text: &str) -> HashMap<IpAddr, String> {
    let mut table = HashMap::new();

    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let Some(ip) = tokens.next().and_then(|t| t.parse::<IpAddr>().ok()) else {
            continue;
        };
        let mac = tokens
            .skip_while(|t| *t != "lladdr")
            .nth(1)
            .and_then(normalize_mac);
        if let Some(mac) = mac {
            table.insert(ip, mac);
        }
    }

    table
}

/// Parses `arp -an` output: `? (192.168.1.1) at a4:5e:60:1:2:3 on en0 ifscope [ethernet]`.
pub fn parse_arp_an(text: &str) -> HashMap<IpAddr, String> {
    ARP_ENTRY
        .captures_iter(text)
        .filter_map(|caps| {
            let ip = caps[1].parse::<IpAddr>().ok()?;
            let mac = normalize_mac(&caps[2])?;
            Some((ip, mac))
        })
        .collect()
}

/// Canonical lower-case, zero-padded form; broadcast and all-zero MACs are dropped.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let mac = MacAddr::from_str(raw).ok()?;
    if mac.is_broadcast() || mac.is_zero() {
        return None;
    }
    Some(mac.to_string().to_ascii_lowercase())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
