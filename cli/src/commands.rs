pub mod cache;
pub mod discover;
pub mod scan;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use netsweep_common::config::Config;
use netsweep_core::rate_limit::RateLimiterStats;

use crate::terminal::print;

#[derive(Parser)]
#[command(name = "netsweep")]
#[command(about = "Concurrent network discovery and port scanning.")]
#[command(version)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Load settings from a TOML file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Network requests per second across the whole run (0 = unlimited)
    #[arg(long, global = true)]
    pub rate: Option<f64>,

    /// Requests allowed in a burst (default: twice the rate)
    #[arg(long, global = true)]
    pub burst: Option<f64>,

    /// Skip hostname resolution
    #[arg(long, global = true)]
    pub no_dns: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Less decoration; repeat to print only results
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    /// More logging; repeat for trace output
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find reachable hosts in a range, CIDR block or address list
    #[command(alias = "d")]
    Discover {
        /// Defaults to the local IPv4 network
        target: Option<String>,
    },
    /// Scan TCP ports on one or more hosts
    #[command(alias = "s")]
    Scan {
        target: String,
        /// Ports to scan, e.g. "22,80,8000-8100" (default: common ports)
        #[arg(short, long)]
        ports: Option<String>,
    },
    /// Inspect or empty the port scan cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq, Debug)]
pub enum CacheAction {
    /// Show entry count, hit rate and location
    Stats,
    /// Drop expired entries
    Prune,
    /// Remove every entry and the cache file
    Clear,
}

/// How results should be rendered.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Loads the configuration file, if any, and applies flag overrides.
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if self.no_dns {
            cfg.no_dns = true;
        }
        if let Some(rate) = self.rate {
            cfg.rate.rate = Some(rate);
        }
        if let Some(burst) = self.burst {
            cfg.rate.burst = Some(burst);
        }
        cfg.quiet = cfg.quiet.max(self.quiet);
        Ok(cfg)
    }

    pub fn output(&self, cfg: &Config) -> Output {
        Output {
            json: self.json,
            quiet: if self.json { 2 } else { cfg.quiet },
        }
    }
}

pub fn print_rate_stats(stats: &RateLimiterStats, out: Output) {
    if out.quiet > 0 {
        return;
    }
    print::header("rate limiter", out.quiet);

    let rate = match (stats.rate, stats.burst) {
        (Some(rate), Some(burst)) => format!("{rate}/s, burst {burst}"),
        _ => "unlimited".to_string(),
    };
    print::aligned_line("Rate", rate, 9);
    print::aligned_line("Requests", stats.total_requests.to_string(), 9);
    print::aligned_line(
        "Throttled",
        format!(
            "{} ({:.1}%)",
            stats.throttled_requests, stats.throttle_percent
        )
        .yellow(),
        9,
    );
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

    #[test]
    fn flags_override_defaults() {
        let cli = CommandLine::try_parse_from([
            "netsweep", "discover", "10.0.0.0/24", "--rate", "50", "--no-dns", "-qq",
        ])
        .unwrap();
        let cfg = cli.config().unwrap();

        assert!(cfg.no_dns);
        assert_eq!(cfg.rate.rate, Some(50.0));
        assert_eq!(cfg.rate.burst, None);
        assert_eq!(cfg.quiet, 2);
        assert!(matches!(
            cli.command,
            Commands::Discover { ref target } if target.as_deref() == Some("10.0.0.0/24")
        ));
    }

    #[test]
    fn scan_accepts_port_list() {
        let cli =
            CommandLine::try_parse_from(["netsweep", "scan", "10.0.0.1", "-p", "22,80"]).unwrap();
        match cli.command {
            Commands::Scan { ports, .. } => assert_eq!(ports.as_deref(), Some("22,80")),
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn json_implies_quiet_output() {
        let cli = CommandLine::try_parse_from(["netsweep", "--json", "cache", "stats"]).unwrap();
        let cfg = cli.config().unwrap();
        let out = cli.output(&cfg);
        assert!(out.json);
        assert_eq!(out.quiet, 2);
        assert!(matches!(
            cli.command,
            Commands::Cache {
                action: CacheAction::Stats
            }
        ));
    }

    #[test]
    fn discover_target_is_optional() {
        let cli = CommandLine::try_parse_from(["netsweep", "discover", "--no-dns"]).unwrap();
        assert!(matches!(cli.command, Commands::Discover { target: None }));
    }
}
