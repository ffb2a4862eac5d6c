use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netsweep_common::neighbors::NeighborTable;
use netsweep_common::system::CommandRunner;
use netsweep_protocols::neighbors as parse;
use tracing::debug;

/// Reads the ARP/NDP cache through the platform's tools.
///
/// macOS uses `arp -an`. Elsewhere `ip neigh` is preferred and `arp -an` is
/// consulted only when it yields nothing.
pub struct SystemNeighbors {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl SystemNeighbors {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    async fn read(
        &self,
        program: &str,
        args: &[&str],
        parser: fn(&str) -> HashMap<IpAddr, String>,
    ) -> HashMap<IpAddr, String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        match self.runner.run(program, &args, self.timeout).await {
            Ok(out) => parser(&out.text),
            Err(e) => {
                debug!("neighbor table via {program} unavailable: {e}");
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl NeighborTable for SystemNeighbors {
    async fn snapshot(&self) -> HashMap<IpAddr, String> {
        if cfg!(target_os = "macos") {
            return self.read("arp", &["-an"], parse::parse_arp_an).await;
        }

        let table = self.read("ip", &["neigh"], parse::parse_ip_neigh).await;
        if !table.is_empty() {
            return table;
        }
        self.read("arp", &["-an"], parse::parse_arp_an).await
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
    use crate::testing::FakeRunner;

    const ARP: &str = "? (192.168.1.1) at 0:11:22:33:44:55 on en0 ifscope [ethernet]\n";

    #[tokio::test]
    async fn missing_tools_yield_empty_table() {
        let runner = Arc::new(FakeRunner::new());
        let table = SystemNeighbors::new(runner, Duration::from_secs(1));
        assert!(table.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn arp_output_is_normalized() {
        let runner = Arc::new(FakeRunner::new().respond("arp", true, ARP));
        let table = SystemNeighbors::new(runner, Duration::from_secs(1));
        let snapshot = table.snapshot().await;
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert_eq!(snapshot.get(&ip).map(String::as_str), Some("00:11:22:33:44:55"));
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn ip_neigh_is_preferred_on_linux() {
        let runner = Arc::new(
            FakeRunner::new()
                .respond("ip", true, "10.0.0.7 dev eth0 lladdr AA:BB:CC:DD:EE:0F REACHABLE\n")
                .respond("arp", true, ARP),
        );
        let table = SystemNeighbors::new(runner.clone(), Duration::from_secs(1));
        let snapshot = table.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(runner.calls_to("arp"), 0);
    }
}
