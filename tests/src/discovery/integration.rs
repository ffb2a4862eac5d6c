use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netsweep_common::config::Config;
use netsweep_common::neighbors::NeighborTable;
use netsweep_core::discovery::{SweepEngine, SweepPhase, SweepSettings};
use netsweep_core::rate_limit::RateLimiter;
use netsweep_core::scanner::{Prober, TcpFallback};
use netsweep_core::services::Services;
use netsweep_core::system::SystemRunner;
use tokio::net::TcpListener;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

struct NoNeighbors;

#[async_trait]
impl NeighborTable for NoNeighbors {
    async fn snapshot(&self) -> HashMap<IpAddr, String> {
        HashMap::new()
    }
}

/// A sweep engine that finds hosts through a handshake with `port`, so the
/// result does not depend on ping being installed or permitted.
fn loopback_engine(port: u16, limiter: Arc<RateLimiter>) -> SweepEngine {
    let prober = Prober::new(Arc::new(SystemRunner), limiter).with_tcp_fallback(TcpFallback {
        ports: vec![port],
        timeout: Duration::from_millis(500),
    });
    let settings = SweepSettings {
        concurrency: 16,
        timeout: Duration::from_secs(1),
        echo_count: 1,
        batch_size: 4,
        resolve_names: false,
    };
    SweepEngine::new(Arc::new(prober), None, Arc::new(NoNeighbors), settings)
}

#[tokio::test]
async fn discovery_single_loopback() {
    let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let limiter = Arc::new(RateLimiter::unlimited());
    let engine = loopback_engine(port, limiter.clone());

    let records = engine.run("127.0.0.1").await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].address, LOCALHOST);
    assert!(records[0].reachable, "localhost should answer");
    assert!(records[0].latency_ms.is_some());
    assert!(limiter.stats().total_requests >= 1);
    assert_eq!(engine.phase(), SweepPhase::Idle);
}

#[tokio::test]
#[cfg(target_os = "linux")]
async fn discovery_range_loopback() {
    let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let engine = loopback_engine(port, Arc::new(RateLimiter::unlimited()));

    let records = engine.run("127.0.0.1-3").await.unwrap();

    let reachable: Vec<IpAddr> = records
        .iter()
        .filter(|r| r.reachable)
        .map(|r| r.address)
        .collect();
    assert_eq!(reachable.len(), 3, "found {reachable:?}");
}

#[tokio::test]
async fn rate_limited_sweep_through_services() {
    let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut cfg = Config::default();
    cfg.no_dns = true;
    cfg.cache.path = None;
    cfg.rate.rate = Some(200.0);
    cfg.sweep.fallback_ports = vec![port];
    cfg.sweep.timeout_ms = 500;

    let services = Services::from_config(&cfg);
    let records = services.sweep.run("127.0.0.1").await.unwrap();
    assert!(records[0].reachable);

    let stats = services.limiter.stats();
    assert_eq!(stats.rate, Some(200.0));
    assert_eq!(stats.burst, Some(400.0));
    assert!(stats.total_requests >= 1);
}
