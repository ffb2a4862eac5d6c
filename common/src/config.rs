//! Runtime configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) yields a
//! usable [`Config`]. Command-line flags are applied on top by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Skips hostname resolution during sweeps.
    pub no_dns: bool,
    /// 0 prints everything, 1 hides decoration, 2 prints only results.
    pub quiet: u8,
    pub sweep: SweepConfig,
    pub ports: PortScanConfig,
    pub rate: RateConfig,
    pub cache: CacheConfig,
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub echo_count: u32,
    pub batch_size: usize,
    pub tcp_fallback: bool,
    pub fallback_ports: Vec<u16>,
    pub fallback_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortScanConfig {
    pub concurrency: usize,
    pub timeout_ms: u64,
}

/// Global request ceiling. An absent or non-positive rate means unlimited.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub rate: Option<f64>,
    pub burst: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `None` keeps the cache in memory only.
    pub path: Option<PathBuf>,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub concurrency: usize,
    pub lookup_timeout_ms: u64,
    pub tool_timeout_ms: u64,
    pub budget_ms: u64,
    pub use_dns_sd: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            concurrency: 128,
            timeout_ms: 1_000,
            echo_count: 1,
            batch_size: 32,
            tcp_fallback: true,
            fallback_ports: vec![80, 443, 22, 445, 139, 3389],
            fallback_timeout_ms: 300,
        }
    }
}

impl Default for PortScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 256,
            timeout_ms: 500,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            ttl_secs: 3_600,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            lookup_timeout_ms: 500,
            tool_timeout_ms: 1_500,
            budget_ms: 5_000,
            use_dns_sd: cfg!(target_os = "macos"),
        }
    }
}

fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("netsweep").join("ports.json"))
}

impl SweepConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }
}

impl PortScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl ResolverConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
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
