//! # Port Scan Cache
//!
//! Port scans are the most expensive thing netsweep does, so their results are
//! kept for a configurable time-to-live and persisted to a JSON file between
//! runs. The file maps each address to its open ports, the ports that were
//! probed, and the epoch second the scan finished:
//!
//! ```json
//! { "192.168.1.10": { "open_ports": [22, 80], "probed_ports": [22, 80, 443], "created_at": 1718000000.5 } }
//! ```
//!
//! A result only answers for the ports it probed: a request for ports outside
//! that set is a miss.
//!
//! Memory is authoritative. Failing to write the file is logged and otherwise
//! ignored. Every change, including purging an entry that expired on read,
//! rewrites the file under the state lock, so callers on an async runtime
//! should reach the cache through `spawn_blocking`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use netsweep_common::network::host::PortScanResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
enum CacheError {
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode cache: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    open_ports: BTreeSet<u16>,
    /// Absent in files written before probed sets were recorded.
    #[serde(default)]
    probed_ports: BTreeSet<u16>,
    created_at: f64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: PortScanResult,
    /// Always a superset of the open ports.
    probed: BTreeSet<u16>,
    created_at: f64,
}

impl CacheEntry {
    fn covers(&self, ports: &[u16]) -> bool {
        ports.iter().all(|port| self.probed.contains(port))
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<IpAddr, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Counters for renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
    pub path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ResultCache {
    state: Mutex<CacheState>,
    path: Option<PathBuf>,
    ttl: Duration,
}

impl ResultCache {
    /// A cache that never touches the disk.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            path: None,
            ttl,
        }
    }

    /// Loads the cache stored at `path`, keeping only entries still valid.
    ///
    /// A missing file starts an empty cache. An unreadable or corrupt one does
    /// too, with a warning; it is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        let mut state = CacheState::default();
        let now = now_epoch();

        for (address, entry) in load_file(&path) {
            if is_fresh(entry.created_at, now, ttl) {
                let mut probed = entry.probed_ports;
                probed.extend(&entry.open_ports);
                let result = PortScanResult::new(address, entry.open_ports);
                state.entries.insert(
                    address,
                    CacheEntry {
                        result,
                        probed,
                        created_at: entry.created_at,
                    },
                );
            }
        }
        debug!("loaded {} cached scans from {}", state.entries.len(), path.display());

        Self {
            state: Mutex::new(state),
            path: Some(path),
            ttl,
        }
    }

    /// Persistent when `path` is given, in-memory otherwise.
    pub fn new(path: Option<PathBuf>, ttl: Duration) -> Self {
        match path {
            Some(path) => Self::open(path, ttl),
            None => Self::in_memory(ttl),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, address: IpAddr) -> Option<PortScanResult> {
        self.get_with_age(address).map(|(result, _)| result)
    }

    /// The cached result and how long ago it was stored, whatever ports it
    /// probed.
    pub fn get_with_age(&self, address: IpAddr) -> Option<(PortScanResult, Duration)> {
        self.lookup(address, &[])
    }

    /// Like [`ResultCache::get_with_age`], but only a result that probed every
    /// port in `ports` is a hit.
    pub fn get_covering(&self, address: IpAddr, ports: &[u16]) -> Option<(PortScanResult, Duration)> {
        self.lookup(address, ports)
    }

    /// Reading an expired entry removes it and rewrites the file.
    fn lookup(&self, address: IpAddr, ports: &[u16]) -> Option<(PortScanResult, Duration)> {
        let now = now_epoch();
        let mut state = self.lock();

        let found = state.entries.get(&address).map(|entry| {
            (
                is_fresh(entry.created_at, now, self.ttl),
                entry.covers(ports),
                entry.clone(),
            )
        });

        match found {
            Some((true, true, entry)) => {
                state.hits += 1;
                Some((entry.result, age_of(entry.created_at, now)))
            }
            Some((false, _, _)) => {
                state.entries.remove(&address);
                state.misses += 1;
                self.persist(&state);
                None
            }
            Some((true, false, _)) | None => {
                state.misses += 1;
                None
            }
        }
    }

    /// A valid entry and its age, leaving the hit counters and the entries
    /// untouched.
    pub fn peek(&self, address: IpAddr) -> Option<(PortScanResult, Duration)> {
        let now = now_epoch();
        let state = self.lock();
        state
            .entries
            .get(&address)
            .filter(|entry| is_fresh(entry.created_at, now, self.ttl))
            .map(|entry| (entry.result.clone(), age_of(entry.created_at, now)))
    }

    pub fn age(&self, address: IpAddr) -> Option<Duration> {
        self.peek(address).map(|(_, age)| age)
    }

    /// Stores `result` under its address, together with the ports that were
    /// probed to produce it, and writes the file.
    pub fn put(&self, result: PortScanResult, probed: impl IntoIterator<Item = u16>) {
        let mut probed: BTreeSet<u16> = probed.into_iter().collect();
        probed.extend(&result.open_ports);

        let mut state = self.lock();
        state.entries.insert(
            result.address,
            CacheEntry {
                result,
                probed,
                created_at: now_epoch(),
            },
        );
        self.persist(&state);
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = now_epoch();
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| is_fresh(entry.created_at, now, self.ttl));
        let removed = before - state.entries.len();

        if removed > 0 {
            self.persist(&state);
        }
        removed
    }

    /// Empties the cache and deletes its file.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();

        let Some(path) = &self.path else {
            return;
        };
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("could not delete cache file {}: {e}", path.display()),
        }
    }

    /// Rewrites the file from memory.
    pub fn save(&self) {
        let state = self.lock();
        self.persist(&state);
    }

    /// Number of entries that are still valid.
    pub fn len(&self) -> usize {
        let now = now_epoch();
        self.lock()
            .entries
            .values()
            .filter(|entry| is_fresh(entry.created_at, now, self.ttl))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.len();
        let state = self.lock();
        CacheStats {
            entries,
            hits: state.hits,
            misses: state.misses,
            ttl_secs: self.ttl.as_secs(),
            path: self.path.clone(),
        }
    }

    /// Called with the state lock held so concurrent writers cannot interleave.
    fn persist(&self, state: &CacheState) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_file(path, &state.entries) {
            warn!("cache not saved: {e}");
        }
    }
}

fn load_file(path: &Path) -> Vec<(IpAddr, StoredEntry)> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("cannot read cache {}: {e}", path.display());
            return Vec::new();
        }
    };

    let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&text) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("ignoring corrupt cache {}: {e}", path.display());
            return Vec::new();
        }
    };

    raw.into_iter()
        .filter_map(|(key, value)| {
            let address = key.parse::<IpAddr>().ok()?;
            let entry = serde_json::from_value::<StoredEntry>(value).ok()?;
            Some((address, entry))
        })
        .collect()
}

/// Writes `<file>.tmp` and renames it over `path`.
fn write_file(path: &Path, entries: &HashMap<IpAddr, CacheEntry>) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    let stored: BTreeMap<String, StoredEntry> = entries
        .iter()
        .map(|(address, entry)| {
            (
                address.to_string(),
                StoredEntry {
                    open_ports: entry.result.open_ports.clone(),
                    probed_ports: entry.probed.clone(),
                    created_at: entry.created_at,
                },
            )
        })
        .collect();
    let bytes = serde_json::to_vec_pretty(&stored)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn is_fresh(created_at: f64, now: f64, ttl: Duration) -> bool {
    now - created_at < ttl.as_secs_f64()
}

fn age_of(created_at: f64, now: f64) -> Duration {
    Duration::try_from_secs_f64(now - created_at).unwrap_or_default()
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
    use tempfile::tempdir;

    const HOUR: Duration = Duration::from_secs(3_600);

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn result(addr: &str, ports: &[u16]) -> PortScanResult {
        PortScanResult::new(ip(addr), ports.iter().copied())
    }

    /// Stores a scan whose probed set is exactly its open ports.
    fn put(cache: &ResultCache, addr: &str, ports: &[u16]) {
        cache.put(result(addr, ports), ports.iter().copied());
    }

    #[test]
    fn put_then_get_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ports.json");

        let cache = ResultCache::open(&path, HOUR);
        put(&cache, "10.0.0.1", &[443, 22]);
        assert!(path.exists());

        let reopened = ResultCache::open(&path, HOUR);
        let cached = reopened.get(ip("10.0.0.1")).unwrap();
        assert_eq!(cached.ports(), vec![22, 443]);
        assert!(reopened.age(ip("10.0.0.1")).unwrap() < Duration::from_secs(5));
    }

    #[test]
    fn file_uses_flat_address_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ports.json");
        put(&ResultCache::open(&path, HOUR), "10.0.0.1", &[80]);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["10.0.0.1"]["open_ports"], serde_json::json!([80]));
        assert!(raw["10.0.0.1"]["created_at"].is_f64());
        assert!(!dir.path().join("ports.json.tmp").exists());
    }

    #[test]
    fn expired_entries_are_absent() {
        let cache = ResultCache::in_memory(Duration::from_millis(50));
        put(&cache, "10.0.0.1", &[22]);
        assert!(cache.get(ip("10.0.0.1")).is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert!(cache.get(ip("10.0.0.1")).is_none());
        assert_eq!(cache.age(ip("10.0.0.1")), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_on_disk_are_dropped_at_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ports.json");
        let stale = now_epoch() - 7_200.0;
        let fresh = now_epoch() - 10.0;
        fs::write(
            &path,
            format!(
                r#"{{"10.0.0.1": {{"open_ports": [22], "created_at": {stale}}},
                    "10.0.0.2": {{"open_ports": [80], "created_at": {fresh}}},
                    "not-an-ip": {{"open_ports": [1], "created_at": {fresh}}}}}"#
            ),
        )
        .unwrap();

        let cache = ResultCache::open(&path, HOUR);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(ip("10.0.0.1")).is_none());
        assert_eq!(cache.get(ip("10.0.0.2")).unwrap().ports(), vec![80]);
    }

    #[test]
    fn corrupt_file_yields_empty_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ports.json");
        fs::write(&path, "{ this is not json").unwrap();

        let cache = ResultCache::open(&path, HOUR);
        assert!(cache.is_empty());

        put(&cache, "10.0.0.3", &[8080]);
        assert_eq!(ResultCache::open(&path, HOUR).len(), 1);
    }

    #[test]
    fn clear_expired_counts_removed_entries() {
        let cache = ResultCache::in_memory(Duration::from_millis(50));
        put(&cache, "10.0.0.1", &[22]);
        put(&cache, "10.0.0.2", &[22]);
        std::thread::sleep(Duration::from_millis(80));
        put(&cache, "10.0.0.3", &[22]);

        assert_eq!(cache.clear_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clear_expired(), 0);
    }

    #[test]
    fn clear_deletes_backing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ports.json");
        let cache = ResultCache::open(&path, HOUR);
        put(&cache, "10.0.0.1", &[22]);

        cache.clear();
        assert!(cache.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn persist_failure_keeps_memory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        // the parent "directory" is a regular file
        let cache = ResultCache::open(blocker.join("ports.json"), HOUR);
        put(&cache, "10.0.0.1", &[22]);
        assert_eq!(cache.get(ip("10.0.0.1")).unwrap().ports(), vec![22]);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = ResultCache::in_memory(HOUR);
        put(&cache, "10.0.0.1", &[22]);
        cache.get(ip("10.0.0.1"));
        cache.get(ip("10.0.0.1"));
        cache.get(ip("10.0.0.9"));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.ttl_secs, 3_600);
        assert_eq!(stats.path, None);
    }

    #[test]
    fn uncovered_ports_are_a_miss() {
        let cache = ResultCache::in_memory(HOUR);
        cache.put(result("10.0.0.1", &[22]), [1, 22, 80]);

        assert!(cache.get_covering(ip("10.0.0.1"), &[22, 80]).is_some());
        assert!(cache.get_covering(ip("10.0.0.1"), &[]).is_some());
        assert!(cache.get_covering(ip("10.0.0.1"), &[443]).is_none());
        assert!(cache.get_covering(ip("10.0.0.1"), &[22, 443]).is_none());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 2));
    }

    #[test]
    fn scanned_port_set_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ports.json");
        ResultCache::open(&path, HOUR).put(result("10.0.0.1", &[22]), [21, 22, 23]);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["10.0.0.1"]["probed_ports"], serde_json::json!([21, 22, 23]));

        let reopened = ResultCache::open(&path, HOUR);
        assert!(reopened.get_covering(ip("10.0.0.1"), &[21, 23]).is_some());
        assert!(reopened.get_covering(ip("10.0.0.1"), &[24]).is_none());
    }

    #[test]
    fn entries_without_scanned_set_cover_their_open_ports() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ports.json");
        let fresh = now_epoch() - 10.0;
        fs::write(
            &path,
            format!(r#"{{"10.0.0.1": {{"open_ports": [22, 80], "created_at": {fresh}}}}}"#),
        )
        .unwrap();

        let cache = ResultCache::open(&path, HOUR);
        assert!(cache.get_covering(ip("10.0.0.1"), &[80]).is_some());
        assert!(cache.get_covering(ip("10.0.0.1"), &[443]).is_none());
    }

    #[test]
    fn expired_read_rewrites_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ports.json");
        let cache = ResultCache::open(&path, Duration::from_millis(50));
        put(&cache, "10.0.0.1", &[22]);
        std::thread::sleep(Duration::from_millis(80));

        assert!(cache.get(ip("10.0.0.1")).is_none());
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("10.0.0.1").is_none());
    }

    #[test]
    fn peek_leaves_counters_alone() {
        let cache = ResultCache::in_memory(HOUR);
        put(&cache, "10.0.0.1", &[22]);

        let (cached, age) = cache.peek(ip("10.0.0.1")).unwrap();
        assert_eq!(cached.ports(), vec![22]);
        assert!(age < Duration::from_secs(5));
        assert!(cache.peek(ip("10.0.0.2")).is_none());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }
}
