//! # Sweep Records
//!
//! The values produced by probing, enrichment and port scanning.

use std::collections::BTreeSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Outcome of one reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeResult {
    pub address: IpAddr,
    pub reachable: bool,
    pub latency_ms: Option<f64>,
}

impl ProbeResult {
    pub fn unreachable(address: IpAddr) -> Self {
        Self {
            address,
            reachable: false,
            latency_ms: None,
        }
    }

    pub fn reachable(address: IpAddr, latency_ms: Option<f64>) -> Self {
        Self {
            address,
            reachable: true,
            latency_ms,
        }
    }
}

/// One row of a sweep, filled in as enrichment data arrives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostRecord {
    pub address: IpAddr,
    pub reachable: bool,
    pub latency_ms: Option<f64>,
    pub hostname: Option<String>,
    pub mac: Option<String>,
}

impl HostRecord {
    /// A placeholder shown before the address has been probed.
    pub fn pending(address: IpAddr) -> Self {
        Self {
            address,
            reachable: false,
            latency_ms: None,
            hostname: None,
            mac: None,
        }
    }

    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }

    pub fn with_mac(mut self, mac: Option<String>) -> Self {
        self.mac = mac;
        self
    }
}

impl From<ProbeResult> for HostRecord {
    fn from(probe: ProbeResult) -> Self {
        Self {
            address: probe.address,
            reachable: probe.reachable,
            latency_ms: probe.latency_ms,
            hostname: None,
            mac: None,
        }
    }
}

/// Open TCP ports found on one address, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortScanResult {
    pub address: IpAddr,
    pub open_ports: BTreeSet<u16>,
}

impl PortScanResult {
    pub fn new(address: IpAddr, open_ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            address,
            open_ports: open_ports.into_iter().collect(),
        }
    }

    pub fn ports(&self) -> Vec<u16> {
        self.open_ports.iter().copied().collect()
    }
}
