//! # Network Discovery Service
//!
//! Implements the "sweep" use case: expand a target, probe every address on a
//! bounded pool, and enrich the results in fixed-size batches with hostnames
//! and MAC addresses as they come in.
//!
//! The engine owns one shared result set. A new sweep replaces it wholesale
//! with one unreachable placeholder per address, and each enriched batch is
//! merged into it under a single lock before being handed to the caller.
//! Only one sweep may run at a time.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use netsweep_common::config::Config;
use netsweep_common::error::SweepError;
use netsweep_common::neighbors::NeighborTable;
use netsweep_common::network::host::{HostRecord, ProbeResult};
use netsweep_common::network::target;
use netsweep_common::{info, success};
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::pool_width;
use crate::scanner::Prober;
use crate::scanner::resolver::HostnameResolver;

/// No sweep ever has more probes in flight than this.
const PROBE_POOL_CAP: usize = 1_024;

/// Enriched batches buffered for a slow consumer before the sweep waits.
const BATCH_CHANNEL_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepPhase {
    Idle,
    Expanding,
    Probing,
    Enriching,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    pub concurrency: usize,
    pub timeout: Duration,
    pub echo_count: u32,
    pub batch_size: usize,
    pub resolve_names: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SweepSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            concurrency: cfg.sweep.concurrency,
            timeout: cfg.sweep.timeout(),
            echo_count: cfg.sweep.echo_count,
            batch_size: cfg.sweep.batch_size,
            resolve_names: !cfg.no_dns,
        }
    }
}

/// Totals reported once a sweep has finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepSummary {
    pub addresses: usize,
    pub reachable: usize,
    pub named: usize,
    pub elapsed: Duration,
}

struct SweepState {
    phase: SweepPhase,
    generation: u64,
    records: Vec<HostRecord>,
    index: HashMap<IpAddr, usize>,
}

struct Shared {
    prober: Arc<Prober>,
    resolver: Option<Arc<HostnameResolver>>,
    neighbors: Arc<dyn NeighborTable>,
    settings: SweepSettings,
    state: Mutex<SweepState>,
    running: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SweepState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, generation: u64, phase: SweepPhase) {
        let mut state = self.lock();
        if state.generation == generation {
            state.phase = phase;
        }
    }
}

/// Application Service for Network Discovery.
///
/// Cheap to clone; clones share the same result set and running flag.
#[derive(Clone)]
pub struct SweepEngine {
    shared: Arc<Shared>,
}

impl SweepEngine {
    /// `resolver` may be `None` to never look up names.
    pub fn new(
        prober: Arc<Prober>,
        resolver: Option<HostnameResolver>,
        neighbors: Arc<dyn NeighborTable>,
        settings: SweepSettings,
    ) -> Self {
        let state = SweepState {
            phase: SweepPhase::Idle,
            generation: 0,
            records: Vec::new(),
            index: HashMap::new(),
        };
        Self {
            shared: Arc::new(Shared {
                prober,
                resolver: resolver.map(Arc::new),
                neighbors,
                settings,
                state: Mutex::new(state),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn phase(&self) -> SweepPhase {
        self.shared.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Current results in expansion order.
    pub fn snapshot(&self) -> Vec<HostRecord> {
        self.shared.lock().records.clone()
    }

    /// Starts a sweep of `target` and returns the stream of enriched batches.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, target: &str) -> Result<SweepHandle, SweepError> {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SweepError::AlreadyRunning);
        }
        let guard = RunningGuard {
            shared: self.shared.clone(),
        };

        self.shared.lock().phase = SweepPhase::Expanding;
        let addresses = target::expand(target)?;

        let generation = {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.records = addresses.iter().copied().map(HostRecord::pending).collect();
            state.index = addresses.iter().enumerate().map(|(i, ip)| (*ip, i)).collect();
            state.phase = SweepPhase::Probing;
            state.generation
        };
        info!("Sweeping {} addresses", addresses.len());

        let total = addresses.len();
        let (tx, rx) = mpsc::channel(BATCH_CHANNEL_DEPTH);
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let summary = drive(&shared, addresses, generation, tx).await;
            drop(guard);
            summary
        });

        Ok(SweepHandle {
            batches: rx,
            task,
            total,
        })
    }

    /// Sweeps `target` to completion and returns the final results.
    pub async fn run(&self, target: &str) -> Result<Vec<HostRecord>, SweepError> {
        let handle = self.start(target)?;
        handle.finish().await;
        Ok(self.snapshot())
    }
}

/// Clears the running flag however the sweep ends.
struct RunningGuard {
    shared: Arc<Shared>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.shared.lock().phase = SweepPhase::Idle;
        self.shared.running.store(false, Ordering::Release);
    }
}

/// A sweep in flight.
///
/// Dropping the handle does not stop the sweep; results keep merging into the
/// engine's result set.
pub struct SweepHandle {
    batches: mpsc::Receiver<Vec<HostRecord>>,
    task: JoinHandle<SweepSummary>,
    total: usize,
}

impl SweepHandle {
    /// Number of addresses being swept.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The next enriched batch, or `None` once the sweep is done.
    pub async fn next_batch(&mut self) -> Option<Vec<HostRecord>> {
        self.batches.recv().await
    }

    /// Waits for the sweep to end, discarding batches not yet received.
    pub async fn finish(self) -> SweepSummary {
        drop(self.batches);
        self.task.await.unwrap_or_else(|e| {
            warn!("sweep task failed: {e}");
            SweepSummary::default()
        })
    }
}

async fn drive(
    shared: &Arc<Shared>,
    addresses: Vec<IpAddr>,
    generation: u64,
    tx: mpsc::Sender<Vec<HostRecord>>,
) -> SweepSummary {
    let started = Instant::now();
    let mut summary = SweepSummary {
        addresses: addresses.len(),
        ..SweepSummary::default()
    };
    let batch_size = shared.settings.batch_size.max(1);

    let mut probes = spawn_probes(shared, addresses);
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(result) = probes.recv().await {
        batch.push(result);
        if batch.len() >= batch_size {
            let ready = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            flush(shared, generation, ready, &tx, &mut summary).await;
        }
    }
    if !batch.is_empty() {
        flush(shared, generation, batch, &tx, &mut summary).await;
    }

    summary.elapsed = started.elapsed();
    success!(
        "Sweep finished: {}/{} reachable, {} named in {:.1}s",
        summary.reachable,
        summary.addresses,
        summary.named,
        summary.elapsed.as_secs_f64()
    );
    summary
}

/// Probes every address on a bounded pool; results arrive as they complete.
fn spawn_probes(shared: &Arc<Shared>, addresses: Vec<IpAddr>) -> mpsc::UnboundedReceiver<ProbeResult> {
    let (tx, rx) = mpsc::unbounded_channel();
    let prober = shared.prober.clone();
    let SweepSettings {
        concurrency,
        timeout,
        echo_count,
        ..
    } = shared.settings;
    let width = pool_width(concurrency, addresses.len(), PROBE_POOL_CAP);

    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(width));
        for addr in addresses {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let prober = prober.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let result = prober.probe(addr, timeout, echo_count).await;
                let _ = tx.send(result);
            });
        }
    });

    rx
}

/// Enriches one batch, merges it into the result set and emits it.
async fn flush(
    shared: &Shared,
    generation: u64,
    batch: Vec<ProbeResult>,
    tx: &mpsc::Sender<Vec<HostRecord>>,
    summary: &mut SweepSummary,
) {
    shared.set_phase(generation, SweepPhase::Enriching);

    let reachable: Vec<IpAddr> = batch
        .iter()
        .filter(|probe| probe.reachable)
        .map(|probe| probe.address)
        .collect();

    let mut names = match (&shared.resolver, shared.settings.resolve_names) {
        (Some(resolver), true) if !reachable.is_empty() => resolver.resolve(&reachable).await,
        _ => HashMap::new(),
    };
    let macs = shared.neighbors.snapshot().await;

    let records: Vec<HostRecord> = batch
        .into_iter()
        .map(|probe| {
            let address = probe.address;
            HostRecord::from(probe)
                .with_hostname(names.remove(&address).flatten())
                .with_mac(macs.get(&address).cloned())
        })
        .collect();

    summary.reachable += records.iter().filter(|r| r.reachable).count();
    summary.named += records.iter().filter(|r| r.hostname.is_some()).count();

    {
        let mut state = shared.lock();
        if state.generation != generation {
            debug!("discarding batch from superseded sweep {generation}");
            return;
        }
        for record in &records {
            if let Some(&i) = state.index.get(&record.address) {
                state.records[i] = record.clone();
            }
        }
        state.phase = SweepPhase::Probing;
    }

    // A dropped receiver only means nobody is watching.
    let _ = tx.send(records).await;
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
