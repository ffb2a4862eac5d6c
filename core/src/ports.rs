//! # TCP Port Scanning
//!
//! Full-handshake connects against a set of ports on one address. A port is
//! open when the handshake completes inside the timeout; refusals, resets and
//! timeouts all read as closed.

use std::collections::{BTreeSet, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use rand::seq::SliceRandom;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::network::tcp;
use crate::pool_width;
use crate::rate_limit::RateLimiter;

pub mod service;

/// No scan ever runs more connects at once than this.
pub const HARD_CAP: usize = 1_024;

/// Ports scanned when the user does not name any.
pub const TOP_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 465, 548, 587, 631, 993, 995,
    1433, 1521, 1723, 1883, 2049, 3000, 3306, 3389, 5000, 5353, 5432, 5900, 6379, 8000, 8008,
    8080, 8081, 8443, 8888, 9000, 9090, 9100, 27017,
];

pub struct PortScanner {
    limiter: Arc<RateLimiter>,
}

impl PortScanner {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }

    /// Returns the open ports of `addr` among `ports`, ascending.
    ///
    /// Duplicates are probed once. Ports are tried in random order so a slow
    /// range does not stall the rest.
    pub async fn scan(
        &self,
        addr: IpAddr,
        ports: &[u16],
        concurrency: usize,
        timeout: Duration,
    ) -> BTreeSet<u16> {
        let mut seen = HashSet::new();
        let mut queue: Vec<u16> = ports.iter().copied().filter(|p| seen.insert(*p)).collect();
        if queue.is_empty() {
            return BTreeSet::new();
        }
        queue.shuffle(&mut rand::rng());

        let width = pool_width(concurrency, queue.len(), HARD_CAP);
        let semaphore = Arc::new(Semaphore::new(width));
        let mut probes: JoinSet<Option<u16>> = JoinSet::new();

        for port in queue {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let limiter = self.limiter.clone();
            probes.spawn(async move {
                let _permit = permit;
                limiter.acquire(1).await;
                tcp::handshake_probe(SocketAddr::new(addr, port), timeout)
                    .await
                    .map(|_| port)
            });
        }

        let mut open = BTreeSet::new();
        while let Some(joined) = probes.join_next().await {
            if let Ok(Some(port)) = joined {
                open.insert(port);
            }
        }
        debug!("{addr}: {} open ports", open.len());
        open
    }
}

/// Parses a port list such as `22,80,8000-8010`.
///
/// The result is sorted and free of duplicates. Port 0 is rejected.
pub fn parse_ports(spec: &str) -> anyhow::Result<Vec<u16>> {
    let mut ports = BTreeSet::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_port(start, part)?, parse_port(end, part)?),
            None => {
                let port = parse_port(part, part)?;
                (port, port)
            }
        };
        if start > end {
            bail!("invalid port range '{part}': start is after end");
        }
        ports.extend(start..=end);
    }

    if ports.is_empty() {
        bail!("no ports given");
    }
    Ok(ports.into_iter().collect())
}

fn parse_port(raw: &str, part: &str) -> anyhow::Result<u16> {
    let port: u16 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid port in '{part}'"))?;
    if port == 0 {
        bail!("port 0 is not scannable ('{part}')");
    }
    Ok(port)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
