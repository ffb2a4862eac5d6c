//! # Hostname Resolution
//!
//! Maps addresses to names through a chain of strategies, cheapest first:
//!
//! 1. Reverse DNS through the system resolver, concurrently.
//! 2. `avahi-resolve-address` for everything still unnamed, in one call.
//! 3. `dns-sd -Q <arpa> PTR` per address (macOS by default).
//! 4. `host`, then `dig -x`, per address.
//!
//! A stage only sees addresses the previous stages left unresolved, and the
//! whole chain runs under one time budget. Whatever was resolved when the
//! budget runs out is kept.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use netsweep_common::config::ResolverConfig;
use netsweep_common::system::CommandRunner;
use netsweep_protocols::{dns, mdns, normalize_hostname};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::pool_width;

/// Upper bound on simultaneous PTR lookups regardless of configuration.
const PTR_POOL_CAP: usize = 128;

/// Reverse (PTR) lookup of a single address.
#[async_trait]
pub trait ReverseLookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Option<String>;
}

/// The operating system's resolver, via `getnameinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemReverseLookup;

#[async_trait]
impl ReverseLookup for SystemReverseLookup {
    async fn lookup(&self, ip: IpAddr) -> Option<String> {
        let name = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip))
            .await
            .ok()?
            .ok()?;
        // getnameinfo echoes the address back when there is no PTR record
        if name == ip.to_string() {
            return None;
        }
        normalize_hostname(&name)
    }
}

type Names = Mutex<HashMap<IpAddr, String>>;

pub struct HostnameResolver {
    ptr: Arc<dyn ReverseLookup>,
    runner: Arc<dyn CommandRunner>,
    cfg: ResolverConfig,
}

impl HostnameResolver {
    pub fn new(
        ptr: Arc<dyn ReverseLookup>,
        runner: Arc<dyn CommandRunner>,
        cfg: ResolverConfig,
    ) -> Self {
        Self { ptr, runner, cfg }
    }

    /// Resolves every address in `addresses`; unresolved ones map to `None`.
    ///
    /// Never fails and never runs longer than the configured budget.
    pub async fn resolve(&self, addresses: &[IpAddr]) -> HashMap<IpAddr, Option<String>> {
        let mut seen = HashSet::new();
        let unique: Vec<IpAddr> = addresses.iter().copied().filter(|ip| seen.insert(*ip)).collect();
        if unique.is_empty() {
            return HashMap::new();
        }

        let names: Names = Mutex::new(HashMap::new());
        let budget = self.cfg.budget();
        if tokio::time::timeout(budget, self.run_stages(&unique, &names))
            .await
            .is_err()
        {
            debug!("hostname resolution stopped after {budget:?}");
        }

        let mut names = names.into_inner().unwrap_or_else(PoisonError::into_inner);
        unique.into_iter().map(|ip| (ip, names.remove(&ip))).collect()
    }

    async fn run_stages(&self, unique: &[IpAddr], names: &Names) {
        self.reverse_dns(unique, names).await;

        let pending = unresolved(unique, names);
        if pending.is_empty() {
            return;
        }
        self.avahi(&pending, names).await;

        if self.cfg.use_dns_sd {
            let pending = unresolved(unique, names);
            self.per_address(&pending, names, |ip| self.dns_sd(ip)).await;
        }

        let pending = unresolved(unique, names);
        self.per_address(&pending, names, |ip| self.host_or_dig(ip))
            .await;
    }

    async fn reverse_dns(&self, pending: &[IpAddr], names: &Names) {
        let width = pool_width(self.cfg.concurrency, pending.len(), PTR_POOL_CAP);
        let semaphore = Arc::new(Semaphore::new(width));
        let lookup_timeout = self.cfg.lookup_timeout();
        let mut lookups = JoinSet::new();

        for &ip in pending {
            let semaphore = semaphore.clone();
            let ptr = self.ptr.clone();
            lookups.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let name = tokio::time::timeout(lookup_timeout, ptr.lookup(ip))
                    .await
                    .ok()
                    .flatten()?;
                Some((ip, name))
            });
        }

        while let Some(joined) = lookups.join_next().await {
            if let Ok(Some((ip, name))) = joined {
                record(names, ip, &name);
            }
        }
    }

    async fn avahi(&self, pending: &[IpAddr], names: &Names) {
        let args: Vec<String> = pending.iter().map(IpAddr::to_string).collect();
        let out = match self
            .runner
            .run("avahi-resolve-address", &args, self.cfg.tool_timeout())
            .await
        {
            Ok(out) => out,
            Err(e) => {
                debug!("mDNS lookup skipped: {e}");
                return;
            }
        };

        for (ip, name) in mdns::parse_avahi(&out.text) {
            if pending.contains(&ip) {
                record(names, ip, &name);
            }
        }
    }

    async fn dns_sd(&self, ip: IpAddr) -> Option<String> {
        let args = vec!["-Q".to_string(), dns::reverse_arpa(&ip), "PTR".to_string()];
        self.tool("dns-sd", &args, dns::parse_dns_sd_ptr).await
    }

    async fn host_or_dig(&self, ip: IpAddr) -> Option<String> {
        let target = ip.to_string();
        let host_args = vec!["-W".to_string(), "1".to_string(), target.clone()];
        if let Some(name) = self.tool("host", &host_args, dns::parse_host_pointer).await {
            return Some(name);
        }

        let dig_args = vec![
            "-x".to_string(),
            target,
            "+short".to_string(),
            "+time=1".to_string(),
        ];
        self.tool("dig", &dig_args, dns::parse_dig_short).await
    }

    async fn tool(
        &self,
        program: &str,
        args: &[String],
        parse: fn(&str) -> Option<String>,
    ) -> Option<String> {
        match self.runner.run(program, args, self.cfg.tool_timeout()).await {
            Ok(out) => parse(&out.text),
            Err(e) => {
                debug!("{program} lookup failed: {e}");
                None
            }
        }
    }

    /// Runs `lookup` for every address on a bounded pool, recording each name.
    async fn per_address<'a, F, Fut>(&'a self, pending: &[IpAddr], names: &Names, lookup: F)
    where
        F: Fn(IpAddr) -> Fut,
        Fut: Future<Output = Option<String>> + 'a,
    {
        let width = pool_width(self.cfg.concurrency, pending.len(), PTR_POOL_CAP);
        let mut answers = stream::iter(pending.iter().copied())
            .map(|ip| {
                let answer = lookup(ip);
                async move { (ip, answer.await) }
            })
            .buffer_unordered(width);

        while let Some((ip, answer)) = answers.next().await {
            if let Some(name) = answer {
                record(names, ip, &name);
            }
        }
    }
}

fn record(names: &Names, ip: IpAddr, name: &str) {
    if let Some(name) = normalize_hostname(name) {
        names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(ip)
            .or_insert(name);
    }
}

fn unresolved(unique: &[IpAddr], names: &Names) -> Vec<IpAddr> {
    let names = names.lock().unwrap_or_else(PoisonError::into_inner);
    unique
        .iter()
        .copied()
        .filter(|ip| !names.contains_key(ip))
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
