//! # Netsweep Core
//!
//! The engines behind the CLI:
//!
//! * **[`discovery`]**: the incremental sweep that ties everything together.
//! * **[`scanner`]**: reachability probing and hostname resolution.
//! * **[`ports`]**: TCP port scanning, fronted by the [`cache`].
//! * **[`rate_limit`]**: the request ceiling every network call goes through.
//! * **[`network`]** / **[`system`]**: adapters to sockets and OS tools.

pub mod cache;
pub mod discovery;
pub mod network;
pub mod ports;
pub mod rate_limit;
pub mod scanner;
pub mod services;
pub mod system;

#[cfg(test)]
mod testing;

/// Width of a worker pool: never more workers than items, never zero.
pub(crate) fn pool_width(concurrency: usize, items: usize, cap: usize) -> usize {
    concurrency.min(items).min(cap).max(1)
}
