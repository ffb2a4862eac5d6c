//! Parsers for the textual reports of the OS networking tools netsweep drives.
//!
//! Every parser is total: malformed or foreign output yields "no data"
//! (`None` or an empty collection), never an error.

pub mod dns;
pub mod mdns;
pub mod neighbors;
pub mod ping;

/// Strips the trailing root dot of a DNS name; empty names yield `None`.
pub fn normalize_hostname(name: &str) -> Option<String> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
