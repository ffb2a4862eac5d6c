use std::collections::HashMap;
use std::net::IpAddr;

use crate::normalize_hostname;

/// Parses `avahi-resolve-address` output, one `address<ws>hostname` pair per line.
///
/// Lines for addresses avahi could not resolve (`Failed to resolve address ...`)
/// carry no address in the first column and are skipped.
pub fn parse_avahi(text: &str) -> HashMap<IpAddr, String> {
    let mut names = HashMap::new();

    for line in text.lines() {
        let mut cols = line.split_whitespace();
        let (Some(addr), Some(host)) = (cols.next(), cols.next()) else {
            continue;
        };
        let Ok(ip) = addr.parse::<IpAddr>() else {
            continue;
        };
        if let Some(host) = normalize_hostname(host) {
            names.entry(ip).or_insert(host);
        }
    }

    names
}
