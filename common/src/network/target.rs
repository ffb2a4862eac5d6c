//! # Scan Target Model
//!
//! Parses target specifications and expands them into the ordered list of
//! addresses a sweep will probe. Accepted forms:
//! * A single IPv4/IPv6 address (`192.168.1.5`, `fd00::1`).
//! * An IPv4 range (`192.168.1.1-100`, `192.168.1.1-192.168.1.100`).
//! * A CIDR block (`192.168.1.0/24`, `fd00::/120`).
//! * A comma-separated list of any of the above.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use pnet::ipnetwork::IpNetwork;

use crate::error::TargetError;
use crate::network::range::{self, Ipv4Range};

/// Upper bound on the number of addresses a single specification may expand to.
pub const MAX_TARGETS: u128 = 1 << 20;

/// Represents a distinct target to be scanned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Scan a single specific host.
    Host { target_addr: IpAddr },
    /// Scan an inclusive range of IPv4 addresses.
    Range { ipv4_range: Ipv4Range },
    /// Scan the usable hosts of a network block.
    Cidr { network: IpNetwork },
    /// Holds a list of different targets
    Multi { targets: Vec<Target> },
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetError::invalid(s, "empty target"));
        }

        if s.contains(',') {
            return parse_commas(s);
        }

        if let Some(target) = parse_host(s) {
            return Ok(target);
        }

        if let Some(target) = parse_cidr_range(s)? {
            return Ok(target);
        }

        if let Some(target) = parse_ip_range(s)? {
            return Ok(target);
        }

        Err(TargetError::invalid(
            s,
            "not an address, CIDR block or address range",
        ))
    }
}

impl Target {
    /// Number of addresses this target denotes, duplicates included.
    pub fn len(&self) -> u128 {
        match self {
            Target::Host { .. } => 1,
            Target::Range { ipv4_range } => ipv4_range.len(),
            Target::Cidr { network } => range::usable_hosts(*network).len(),
            Target::Multi { targets } => targets
                .iter()
                .fold(0u128, |acc, target| acc.saturating_add(target.len())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expands the target in order, dropping repeated addresses.
    pub fn addresses(&self) -> Vec<IpAddr> {
        let mut seen: HashSet<IpAddr> = HashSet::new();
        let mut out: Vec<IpAddr> = Vec::new();
        self.collect_into(&mut seen, &mut out);
        out
    }

    fn collect_into(&self, seen: &mut HashSet<IpAddr>, out: &mut Vec<IpAddr>) {
        match self {
            Target::Host { target_addr } => push_unique(seen, out, *target_addr),
            Target::Range { ipv4_range } => {
                for ip in ipv4_range.to_iter() {
                    push_unique(seen, out, ip);
                }
            }
            Target::Cidr { network } => {
                for ip in range::usable_hosts(*network).to_iter() {
                    push_unique(seen, out, ip);
                }
            }
            Target::Multi { targets } => {
                for target in targets {
                    target.collect_into(seen, out);
                }
            }
        }
    }
}

fn push_unique(seen: &mut HashSet<IpAddr>, out: &mut Vec<IpAddr>, ip: IpAddr) {
    if seen.insert(ip) {
        out.push(ip);
    }
}

/// Parses `spec` and returns every address it denotes, in order.
pub fn expand(spec: &str) -> Result<Vec<IpAddr>, TargetError> {
    let target = Target::from_str(spec)?;
    let len = target.len();
    if len > MAX_TARGETS {
        return Err(TargetError::invalid(
            spec,
            format!("expands to {len} addresses, limit is {MAX_TARGETS}"),
        ));
    }
    Ok(target.addresses())
}

/// Parses a comma-separated list of targets (e.g., "192.168.1.5, 10.0.0.1-50").
fn parse_commas(s: &str) -> Result<Target, TargetError> {
    let mut targets = Vec::new();

    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        targets.push(Target::from_str(part)?);
    }

    if targets.is_empty() {
        return Err(TargetError::invalid(s, "empty target list"));
    }

    Ok(Target::Multi { targets })
}

/// Parses a single IP address.
fn parse_host(s: &str) -> Option<Target> {
    s.parse::<IpAddr>()
        .ok()
        .map(|target_addr| Target::Host { target_addr })
}

/// Parses a range string like "1.1.1.1-2.2.2.2" or "1.1.1.1-50".
fn parse_ip_range(s: &str) -> Result<Option<Target>, TargetError> {
    let Some((start_str, end_str)) = s.split_once('-') else {
        return Ok(None);
    };

    let start_addr = start_str
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| TargetError::invalid(s, format!("invalid start address '{start_str}': {e}")))?;

    let end_addr = parse_range_end_addr(end_str.trim(), &start_addr)
        .map_err(|reason| TargetError::invalid(s, reason))?;

    let ipv4_range = Ipv4Range::ordered(start_addr, end_addr);
    Ok(Some(Target::Range { ipv4_range }))
}

/// Helper to parse the end address of a range.
///
/// Handles abbreviated forms like "192.168.1.1-50" (implies 192.168.1.50)
/// and full forms like "192.168.1.1-192.168.1.255".
fn parse_range_end_addr(end_str: &str, start_addr: &Ipv4Addr) -> Result<Ipv4Addr, String> {
    if let Ok(full_addr) = end_str.parse::<Ipv4Addr>() {
        return Ok(full_addr);
    }

    if end_str.is_empty() {
        return Err("range end cannot be empty".to_string());
    }

    let mut end_octets = start_addr.octets();
    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(|octet_str| octet_str.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| format!("invalid range end '{end_str}': {e}"))?;

    if partial_octets.len() > 4 {
        return Err(format!("range end has too many octets: {end_str}"));
    }

    let start_index = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

/// Parses CIDR notation like "192.168.1.0/24". Host bits are ignored.
fn parse_cidr_range(s: &str) -> Result<Option<Target>, TargetError> {
    if !s.contains('/') {
        return Ok(None);
    }

    let network = IpNetwork::from_str(s)
        .map_err(|e| TargetError::invalid(s, format!("invalid CIDR block: {e}")))?;

    Ok(Some(Target::Cidr { network }))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_parse_range_end_addr_helper() {
        let start = Ipv4Addr::new(192, 168, 1, 10);

        assert_eq!(
            parse_range_end_addr("192.168.1.50", &start),
            Ok(Ipv4Addr::new(192, 168, 1, 50))
        );
        assert_eq!(
            parse_range_end_addr("50", &start),
            Ok(Ipv4Addr::new(192, 168, 1, 50))
        );
        assert_eq!(
            parse_range_end_addr("2.66", &start),
            Ok(Ipv4Addr::new(192, 168, 2, 66))
        );

        assert!(parse_range_end_addr("2.256", &start).is_err());
        assert!(parse_range_end_addr("1.2.3.4.5", &start).is_err());
        assert!(parse_range_end_addr("", &start).is_err());
    }

    #[test]
    fn cidr_30_excludes_network_and_broadcast() {
        let hosts = expand("10.0.0.0/30").unwrap();
        assert_eq!(hosts, vec![v4(10, 0, 0, 1), v4(10, 0, 0, 2)]);
    }

    #[test]
    fn reversed_range_is_normalized() {
        let forward = expand("10.0.0.2-10.0.0.5").unwrap();
        let reversed = expand("10.0.0.5-10.0.0.2").unwrap();
        assert_eq!(forward.len(), 4);
        assert_eq!(forward, reversed);
        assert_eq!(forward.first(), Some(&v4(10, 0, 0, 2)));
    }

    #[test]
    fn short_range_end_uses_start_prefix() {
        let hosts = expand("192.168.1.250-252").unwrap();
        assert_eq!(
            hosts,
            vec![v4(192, 168, 1, 250), v4(192, 168, 1, 251), v4(192, 168, 1, 252)]
        );
    }

    #[test]
    fn single_address_and_slash_32_yield_themselves() {
        assert_eq!(expand("10.1.2.3").unwrap(), vec![v4(10, 1, 2, 3)]);
        assert_eq!(expand("10.1.2.3/32").unwrap(), vec![v4(10, 1, 2, 3)]);
        assert_eq!(
            expand("::1").unwrap(),
            vec![IpAddr::V6("::1".parse().unwrap())]
        );
    }

    #[test]
    fn comma_list_keeps_order_and_drops_duplicates() {
        let hosts = expand("10.0.0.9, 10.0.0.1-2, 10.0.0.9").unwrap();
        assert_eq!(hosts, vec![v4(10, 0, 0, 9), v4(10, 0, 0, 1), v4(10, 0, 0, 2)]);
    }

    #[test]
    fn invalid_targets_are_rejected() {
        for spec in ["", "not-an-ip", "10.0.0.1/33", "10.0.0.256-1.1.1.1", "10.0.0.1-", ","] {
            let err = expand(spec).unwrap_err();
            assert!(matches!(err, TargetError::InvalidTarget { .. }), "{spec}");
        }
    }

    #[test]
    fn oversized_blocks_are_rejected() {
        assert!(expand("10.0.0.0/8").is_err());
        assert!(expand("fd00::/64").is_err());
        assert_eq!(expand("10.0.0.0/16").unwrap().len(), 65_534);
    }
}
