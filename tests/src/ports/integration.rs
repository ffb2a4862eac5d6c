use std::net::{IpAddr, Ipv4Addr};

use netsweep_common::config::Config;
use netsweep_core::ports::service::PortScanStatus;
use netsweep_core::services::Services;
use tempfile::tempdir;
use tokio::net::TcpListener;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

#[tokio::test]
async fn scan_results_persist_across_runs() {
    let dir = tempdir().unwrap();
    let open = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let open_port = open.local_addr().unwrap().port();
    let closed_port = {
        let l = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        l.local_addr().unwrap().port()
    };

    let mut cfg = Config::default();
    cfg.no_dns = true;
    cfg.cache.path = Some(dir.path().join("ports.json"));

    let first_run = Services::from_config(&cfg);
    let outcome = first_run
        .ports
        .scan(LOCALHOST, &[closed_port, open_port])
        .await
        .unwrap();
    assert_eq!(outcome.result.ports(), vec![open_port]);
    assert!(outcome.cached_age.is_none());
    first_run.cache.save();

    let second_run = Services::from_config(&cfg);
    assert!(matches!(
        second_run.ports.status(LOCALHOST),
        PortScanStatus::Cached { .. }
    ));

    let cached = second_run.ports.scan(LOCALHOST, &[open_port]).await.unwrap();
    assert_eq!(cached.result.ports(), vec![open_port]);
    assert!(cached.cached_age.is_some());
    assert_eq!(second_run.limiter.stats().total_requests, 0);
}

#[tokio::test]
async fn cleared_cache_forces_a_rescan() {
    let dir = tempdir().unwrap();
    let open = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port = open.local_addr().unwrap().port();

    let mut cfg = Config::default();
    cfg.cache.path = Some(dir.path().join("ports.json"));

    let services = Services::from_config(&cfg);
    services.ports.scan(LOCALHOST, &[port]).await.unwrap();
    services.cache.clear();
    assert_eq!(services.ports.status(LOCALHOST), PortScanStatus::Unknown);

    let rescanned = services.ports.scan(LOCALHOST, &[port]).await.unwrap();
    assert!(rescanned.cached_age.is_none());
    assert_eq!(services.limiter.stats().total_requests, 2);
}
