//! Builds the engines from a [`Config`], wired to the real OS adapters.
//!
//! Everything that touches the network shares the one [`RateLimiter`] built
//! here.

use std::sync::Arc;
use std::time::Duration;

use netsweep_common::config::Config;
use netsweep_common::system::CommandRunner;

use crate::cache::ResultCache;
use crate::discovery::{SweepEngine, SweepSettings};
use crate::network::neighbors::SystemNeighbors;
use crate::ports::PortScanner;
use crate::ports::service::PortScanService;
use crate::rate_limit::RateLimiter;
use crate::scanner::Prober;
use crate::scanner::resolver::{HostnameResolver, SystemReverseLookup};
use crate::system::SystemRunner;

const NEIGHBOR_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Services {
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResultCache>,
    pub sweep: SweepEngine,
    pub ports: PortScanService,
}

impl Services {
    pub fn from_config(cfg: &Config) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let limiter = Arc::new(RateLimiter::new(cfg.rate.rate, cfg.rate.burst));
        let cache = Arc::new(ResultCache::new(cfg.cache.path.clone(), cfg.cache.ttl()));

        let prober = Prober::from_config(runner.clone(), limiter.clone(), &cfg.sweep);
        let resolver = (!cfg.no_dns).then(|| {
            HostnameResolver::new(
                Arc::new(SystemReverseLookup),
                runner.clone(),
                cfg.resolver.clone(),
            )
        });
        let neighbors = Arc::new(SystemNeighbors::new(runner, NEIGHBOR_TIMEOUT));
        let sweep = SweepEngine::new(
            Arc::new(prober),
            resolver,
            neighbors,
            SweepSettings::from_config(cfg),
        );

        let ports = PortScanService::new(
            PortScanner::new(limiter.clone()),
            cache.clone(),
            &cfg.ports,
        );

        Self {
            limiter,
            cache,
            sweep,
            ports,
        }
    }
}
