use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;

/// Defines the contract for reading the host's neighbor (ARP/NDP) cache.
#[async_trait]
pub trait NeighborTable: Send + Sync {
    /// Returns the current address to MAC mapping.
    ///
    /// MACs are lower-case, colon separated. An unavailable table yields an
    /// empty map.
    async fn snapshot(&self) -> HashMap<IpAddr, String>;
}
