//! # Netsweep Common
//!
//! Models, configuration and the outbound seams shared by every netsweep crate.
//!
//! * **[`network`]**: addresses, targets and the records a sweep produces.
//! * **[`system`]**: the [`system::CommandRunner`] boundary to OS tools.
//! * **[`neighbors`]**: the [`neighbors::NeighborTable`] boundary to the ARP cache.
//! * **[`config`]**: runtime configuration with TOML loading.
//! * **[`error`]**: typed errors surfaced by the core.

pub mod config;
pub mod error;
pub mod logging;
pub mod neighbors;
pub mod network;
pub mod system;

#[doc(hidden)]
pub use tracing as __tracing;
