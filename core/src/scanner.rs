//! # Reachability Probing
//!
//! [`Prober`] answers one question per address: does it respond, and how
//! fast? It asks the operating system's `ping` client first and, when that
//! fails, races TCP handshakes against a handful of common service ports.
//!
//! Every failure mode (missing binary, timeout, garbage output) collapses into
//! an unreachable [`ProbeResult`]; nothing here returns an error.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use netsweep_common::config::SweepConfig;
use netsweep_common::network::host::ProbeResult;
use netsweep_common::system::CommandRunner;
use netsweep_protocols::ping;
use tracing::debug;

use crate::network::tcp;
use crate::rate_limit::RateLimiter;

pub mod resolver;

/// Slack granted to the ping process on top of its own deadline.
const PING_GRACE: Duration = Duration::from_millis(500);

/// Pause between echo requests; both iputils and BSD ping default to 1s.
const ECHO_INTERVAL: Duration = Duration::from_secs(1);

/// Ports tried by the handshake fallback when ping gets no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpFallback {
    pub ports: Vec<u16>,
    pub timeout: Duration,
}

impl Default for TcpFallback {
    fn default() -> Self {
        Self {
            ports: vec![80, 443, 22, 445, 139, 3389],
            timeout: Duration::from_millis(300),
        }
    }
}

pub struct Prober {
    runner: Arc<dyn CommandRunner>,
    limiter: Arc<RateLimiter>,
    fallback: Option<TcpFallback>,
}

impl Prober {
    /// A ping-only prober.
    pub fn new(runner: Arc<dyn CommandRunner>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            runner,
            limiter,
            fallback: None,
        }
    }

    pub fn with_tcp_fallback(mut self, fallback: TcpFallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn from_config(
        runner: Arc<dyn CommandRunner>,
        limiter: Arc<RateLimiter>,
        cfg: &SweepConfig,
    ) -> Self {
        let prober = Self::new(runner, limiter);
        if !cfg.tcp_fallback {
            return prober;
        }
        prober.with_tcp_fallback(TcpFallback {
            ports: cfg.fallback_ports.clone(),
            timeout: cfg.fallback_timeout(),
        })
    }

    /// Probes `addr` with `echo_count` echo requests, each allowed `timeout`.
    pub async fn probe(&self, addr: IpAddr, timeout: Duration, echo_count: u32) -> ProbeResult {
        let echo_count = echo_count.max(1);

        self.limiter.acquire(1).await;
        let result = self.ping(addr, timeout, echo_count).await;
        if result.reachable {
            return result;
        }

        match &self.fallback {
            Some(fallback) => self.handshake(addr, fallback).await.unwrap_or(result),
            None => result,
        }
    }

    async fn ping(&self, addr: IpAddr, timeout: Duration, echo_count: u32) -> ProbeResult {
        let (program, args) = ping_command(addr, timeout, echo_count);
        let deadline = ping_deadline(timeout, echo_count);

        match self.runner.run(program, &args, deadline).await {
            Ok(out) => {
                let report = ping::parse_report(&out.text, out.success);
                if report.replied {
                    ProbeResult::reachable(addr, report.latency_ms)
                } else {
                    debug!("{addr} did not answer ping");
                    ProbeResult::unreachable(addr)
                }
            }
            Err(e) => {
                debug!("ping {addr} failed: {e}");
                ProbeResult::unreachable(addr)
            }
        }
    }

    async fn handshake(&self, addr: IpAddr, fallback: &TcpFallback) -> Option<ProbeResult> {
        let (port, rtt) =
            tcp::first_open(addr, &fallback.ports, fallback.timeout, self.limiter.clone()).await?;
        debug!("{addr} accepted a handshake on port {port}");
        Some(ProbeResult::reachable(addr, Some(rtt.as_secs_f64() * 1_000.0)))
    }
}

/// Outer deadline for a ping run, derived from what the tool itself will do:
/// one echo per interval, then a wait of up to [`reply_wait`] for the last
/// reply.
fn ping_deadline(timeout: Duration, echo_count: u32) -> Duration {
    ECHO_INTERVAL * echo_count.saturating_sub(1) + reply_wait(timeout) + PING_GRACE
}

/// How long ping itself waits for a reply when handed `timeout`.
#[cfg(target_os = "macos")]
fn reply_wait(timeout: Duration) -> Duration {
    Duration::from_millis(wait_millis(timeout))
}

#[cfg(not(target_os = "macos"))]
fn reply_wait(timeout: Duration) -> Duration {
    Duration::from_secs(wait_secs(timeout))
}

#[cfg(target_os = "macos")]
fn wait_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1)
}

// iputils only accepts whole seconds here.
#[cfg(not(target_os = "macos"))]
fn wait_secs(timeout: Duration) -> u64 {
    timeout.as_secs_f64().round().max(1.0) as u64
}

#[cfg(target_os = "macos")]
fn ping_command(addr: IpAddr, timeout: Duration, echo_count: u32) -> (&'static str, Vec<String>) {
    let count = echo_count.to_string();
    match addr {
        IpAddr::V4(_) => (
            "/sbin/ping",
            vec![
                "-c".into(),
                count,
                "-W".into(),
                wait_millis(timeout).to_string(),
                addr.to_string(),
            ],
        ),
        IpAddr::V6(_) => ("ping6", vec!["-c".into(), count, addr.to_string()]),
    }
}

#[cfg(not(target_os = "macos"))]
fn ping_command(addr: IpAddr, timeout: Duration, echo_count: u32) -> (&'static str, Vec<String>) {
    (
        "ping",
        vec![
            "-c".into(),
            echo_count.to_string(),
            "-W".into(),
            wait_secs(timeout).to_string(),
            addr.to_string(),
        ],
    )
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
