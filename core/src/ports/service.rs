//! Cache-fronted port scanning, one scan per address at a time.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use netsweep_common::config::PortScanConfig;
use netsweep_common::error::ScanError;
use netsweep_common::network::host::PortScanResult;
use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::ports::PortScanner;

/// What a renderer can say about an address without scanning it.
#[derive(Debug, Clone, PartialEq)]
pub enum PortScanStatus {
    InProgress,
    Cached { age: Duration, result: PortScanResult },
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortScanOutcome {
    pub result: PortScanResult,
    /// Set when the result came from the cache.
    pub cached_age: Option<Duration>,
}

pub struct PortScanService {
    scanner: PortScanner,
    cache: Arc<ResultCache>,
    in_progress: Mutex<HashSet<IpAddr>>,
    concurrency: usize,
    timeout: Duration,
}

impl PortScanService {
    pub fn new(scanner: PortScanner, cache: Arc<ResultCache>, cfg: &PortScanConfig) -> Self {
        Self {
            scanner,
            cache,
            in_progress: Mutex::new(HashSet::new()),
            concurrency: cfg.concurrency,
            timeout: cfg.timeout(),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    fn in_progress(&self) -> MutexGuard<'_, HashSet<IpAddr>> {
        self.in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Scans `addr`, answering from the cache when a valid entry probed every
    /// port in `ports`.
    ///
    /// A second request for an address whose scan has not finished is
    /// rejected. Only complete scans are cached, and a fresh scan replaces
    /// whatever was cached for the address.
    pub async fn scan(&self, addr: IpAddr, ports: &[u16]) -> Result<PortScanOutcome, ScanError> {
        let wanted = ports.to_vec();
        let cached = self
            .on_cache(move |cache| cache.get_covering(addr, &wanted))
            .await
            .flatten();
        if let Some((result, age)) = cached {
            debug!("{addr}: cached, age={}s", age.as_secs());
            return Ok(PortScanOutcome {
                result,
                cached_age: Some(age),
            });
        }

        let _guard = InProgress::claim(self, addr)?;
        let open = self
            .scanner
            .scan(addr, ports, self.concurrency, self.timeout)
            .await;

        let result = PortScanResult::new(addr, open);
        let stored = result.clone();
        let probed = ports.to_vec();
        self.on_cache(move |cache| cache.put(stored, probed)).await;
        Ok(PortScanOutcome {
            result,
            cached_age: None,
        })
    }

    pub fn status(&self, addr: IpAddr) -> PortScanStatus {
        if self.in_progress().contains(&addr) {
            return PortScanStatus::InProgress;
        }
        match self.cache.peek(addr) {
            Some((result, age)) => PortScanStatus::Cached { age, result },
            None => PortScanStatus::Unknown,
        }
    }

    /// Runs `f` on the blocking pool, since cache reads and writes may
    /// rewrite the file.
    async fn on_cache<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&ResultCache) -> T + Send + 'static,
        T: Send + 'static,
    {
        let cache = self.cache.clone();
        match tokio::task::spawn_blocking(move || f(&cache)).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("cache access failed: {e}");
                None
            }
        }
    }
}

/// Marks an address as being scanned until dropped.
struct InProgress<'a> {
    service: &'a PortScanService,
    addr: IpAddr,
}

impl<'a> InProgress<'a> {
    fn claim(service: &'a PortScanService, addr: IpAddr) -> Result<Self, ScanError> {
        if !service.in_progress().insert(addr) {
            return Err(ScanError::InProgress(addr));
        }
        Ok(Self { service, addr })
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.service.in_progress().remove(&self.addr);
    }
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
    use crate::rate_limit::RateLimiter;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn service(limiter: Arc<RateLimiter>) -> PortScanService {
        let cfg = PortScanConfig {
            concurrency: 8,
            timeout_ms: 500,
        };
        PortScanService::new(
            PortScanner::new(limiter),
            Arc::new(ResultCache::in_memory(Duration::from_secs(3_600))),
            &cfg,
        )
    }

    #[tokio::test]
    async fn second_scan_is_served_from_cache() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let limiter = Arc::new(RateLimiter::unlimited());
        let service = service(limiter.clone());

        let first = service.scan(LOCALHOST, &[port]).await.unwrap();
        assert_eq!(first.result.ports(), vec![port]);
        assert_eq!(first.cached_age, None);
        let requests = limiter.stats().total_requests;

        let second = service.scan(LOCALHOST, &[port]).await.unwrap();
        assert_eq!(second.result, first.result);
        assert!(second.cached_age.is_some());
        assert_eq!(limiter.stats().total_requests, requests);
    }

    #[tokio::test]
    async fn status_reflects_cache_and_progress() {
        let service = service(Arc::new(RateLimiter::unlimited()));
        assert_eq!(service.status(LOCALHOST), PortScanStatus::Unknown);

        let guard = InProgress::claim(&service, LOCALHOST).unwrap();
        assert_eq!(service.status(LOCALHOST), PortScanStatus::InProgress);
        assert_eq!(
            service.scan(LOCALHOST, &[1]).await,
            Err(ScanError::InProgress(LOCALHOST))
        );
        drop(guard);

        service.scan(LOCALHOST, &[]).await.unwrap();
        assert!(matches!(
            service.status(LOCALHOST),
            PortScanStatus::Cached { .. }
        ));
    }

    #[tokio::test]
    async fn ports_outside_the_cached_scan_are_scanned() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = {
            let l = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
            l.local_addr().unwrap().port()
        };
        let service = service(Arc::new(RateLimiter::unlimited()));

        let first = service.scan(LOCALHOST, &[closed]).await.unwrap();
        assert!(first.result.ports().is_empty());

        let second = service.scan(LOCALHOST, &[open]).await.unwrap();
        assert_eq!(second.result.ports(), vec![open]);
        assert_eq!(second.cached_age, None);

        let third = service.scan(LOCALHOST, &[open]).await.unwrap();
        assert_eq!(third.result.ports(), vec![open]);
        assert!(third.cached_age.is_some());
    }

    #[tokio::test]
    async fn status_does_not_count_as_a_cache_read() {
        let service = service(Arc::new(RateLimiter::unlimited()));
        service.scan(LOCALHOST, &[]).await.unwrap();
        let before = service.cache().stats();

        service.status(LOCALHOST);
        service.status("10.0.0.9".parse().unwrap());

        let after = service.cache().stats();
        assert_eq!((after.hits, after.misses), (before.hits, before.misses));
    }
}
