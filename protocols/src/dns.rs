//! # Reverse DNS Report Parsing
//!
//! Pointer-record extraction for `host`, `dig +short` and `dns-sd -Q`.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;

use crate::normalize_hostname;

static HOST_POINTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)domain name pointer\s+(\S+)\s*$").expect("valid host regex")
});

static DNS_SD_PTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\bPTR\s+(?:IN\s+)?([A-Za-z0-9_.-]+)\s*$").expect("valid dns-sd regex")
});

/// The `in-addr.arpa` / `ip6.arpa` name queried for `ip`'s PTR record.
pub fn reverse_arpa(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}.in-addr.arpa")
        }
        IpAddr::V6(v6) => {
            let mut labels: Vec<String> = Vec::with_capacity(33);
            for byte in v6.octets().iter().rev() {
                labels.push(format!("{:x}", byte & 0x0f));
                labels.push(format!("{:x}", byte >> 4));
            }
            labels.push("ip6.arpa".to_string());
            labels.join(".")
        }
    }
}

/// `host -W 1 <ip>`: `1.1.168.192.in-addr.arpa domain name pointer router.lan.`
pub fn parse_host_pointer(text: &str) -> Option<String> {
    HOST_POINTER
        .captures(text)
        .and_then(|caps| normalize_hostname(&caps[1]))
}

/// `dig -x <ip> +short`: the first answer line. Diagnostic lines (`;;`) are not answers.
pub fn parse_dig_short(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| !line.starts_with(';') && !line.contains(char::is_whitespace))
        .and_then(normalize_hostname)
}

/// `dns-sd -Q <arpa> PTR`: `... Add  2  4  1.1.168.192.in-addr.arpa.  PTR  IN  router.local.`
pub fn parse_dns_sd_ptr(text: &str) -> Option<String> {
    DNS_SD_PTR
        .captures_iter(text)
        .filter_map(|caps| normalize_hostname(&caps[1]))
        .find(|name| !name.ends_with(".arpa"))
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

    #[test]
    fn reverse_arpa_v4_and_v6() {
        let ip: IpAddr = "192.168.1.20".parse().unwrap();
        assert_eq!(reverse_arpa(&ip), "20.1.168.192.in-addr.arpa");

        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        let arpa = reverse_arpa(&ip);
        assert!(arpa.starts_with("1.0.0.0.0.0.0.0"));
        assert!(arpa.ends_with("8.b.d.0.1.0.0.2.ip6.arpa"));
    }

    #[test]
    fn host_pointer_strips_root_dot() {
        let text = "20.1.168.192.in-addr.arpa domain name pointer nas.lan.\n";
        assert_eq!(parse_host_pointer(text).as_deref(), Some("nas.lan"));
        let missing = "Host 20.1.168.192.in-addr.arpa. not found: 3(NXDOMAIN)";
        assert_eq!(parse_host_pointer(missing), None);
    }

    #[test]
    fn dig_short_ignores_diagnostics() {
        assert_eq!(parse_dig_short("\nprinter.lan.\n").as_deref(), Some("printer.lan"));
        assert_eq!(parse_dig_short(";; connection timed out; no servers could be reached"), None);
        assert_eq!(parse_dig_short(""), None);
    }

    #[test]
    fn dns_sd_ptr_record() {
        let text = "DATE: ---Mon 19 Oct 2026---
12:00:00.000  ...STARTING...
Timestamp     A/R  Flags IF  Name                          Type  Class  Rdata
12:00:00.100  Add  2     4   20.1.168.192.in-addr.arpa.    PTR   IN     macbook.local.";
        assert_eq!(parse_dns_sd_ptr(text).as_deref(), Some("macbook.local"));

        let text = "12:00:00.100  Add  2  4  20.1.168.192.in-addr.arpa.  PTR  macbook.local.";
        assert_eq!(parse_dns_sd_ptr(text).as_deref(), Some("macbook.local"));
    }
}
