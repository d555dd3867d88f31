//! Content-addressed result cache for simulation outputs.
//!
//! Keys are [`SimulationInputs`](crate::model::SimulationInputs)
//! fingerprints. Entries are TTL-bounded and LRU-evicted. Lookups take the
//! read lock, mutations the write lock, and snapshot serialization its own
//! lock so a save never blocks readers. Persistence failures degrade the
//! cache to in-memory-only operation with a warning; they are never
//! surfaced to the simulate path.
//!
//! Snapshot layout: `magic (4) | version (u32 LE) | created_at (u64 LE)`
//! followed by a bincode-encoded record list. Unknown versions and corrupt
//! bodies are discarded on load, never propagated as errors.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{EngineError, Result};
use crate::model::inputs::TrialSet;

const SNAPSHOT_MAGIC: [u8; 4] = *b"GSMC";
const SNAPSHOT_VERSION: u32 = 1;

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

/// Partial runtime reconfiguration; `None` fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfigUpdate {
    pub max_entries: Option<usize>,
    pub ttl_seconds: Option<u64>,
    pub save_interval_seconds: Option<u64>,
    pub dir: Option<PathBuf>,
    pub file: Option<String>,
}

struct Entry {
    value: Arc<TrialSet>,
    created_at: u64,
    last_used: AtomicU64,
}

#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    key: String,
    value: TrialSet,
    created_at: u64,
}

#[derive(Default)]
struct CacheMap {
    entries: FxHashMap<String, Entry>,
    /// LRU clock; bumped on every touch.
    tick: u64,
}

/// Thread-safe TTL + LRU cache with atomic snapshot persistence.
pub struct ResultCache {
    map: RwLock<CacheMap>,
    config: RwLock<CacheConfig>,
    snapshot_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Set after a persistence failure; auto-save skips until an explicit
    /// save succeeds again.
    degraded: AtomicBool,
}

impl ResultCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            map: RwLock::new(CacheMap::default()),
            config: RwLock::new(config),
            snapshot_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            degraded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        read_lock(&self.config).disabled
    }

    /// Look up a key. Expired entries read as misses and are evicted
    /// lazily. Hit bookkeeping uses atomics so lookups stay on the read
    /// lock.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<TrialSet>> {
        if self.is_disabled() {
            return None;
        }
        let ttl = read_lock(&self.config).ttl_seconds;
        let now = unix_now();

        let expired = {
            let map = read_lock(&self.map);
            match map.entries.get(key) {
                Some(entry) if !is_expired(entry.created_at, now, ttl) => {
                    entry.last_used.store(map.tick.wrapping_add(1), Ordering::Relaxed);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "cache hit");
                    return Some(Arc::clone(&entry.value));
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut map = write_lock(&self.map);
            // Recheck under the write lock; another caller may have
            // replaced the entry meanwhile
            if map
                .entries
                .get(key)
                .is_some_and(|e| is_expired(e.created_at, unix_now(), ttl))
            {
                map.entries.remove(key);
                debug!(key, "evicted expired entry");
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a value, evicting least-recently-used entries beyond the
    /// configured capacity.
    pub fn put(&self, key: impl Into<String>, value: Arc<TrialSet>) {
        if self.is_disabled() {
            return;
        }
        let max_entries = read_lock(&self.config).max_entries;
        let mut map = write_lock(&self.map);
        map.tick = map.tick.wrapping_add(1);
        let tick = map.tick;
        map.entries.insert(
            key.into(),
            Entry {
                value,
                created_at: unix_now(),
                last_used: AtomicU64::new(tick),
            },
        );
        while map.entries.len() > max_entries {
            let oldest = map
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    map.entries.remove(&k);
                    debug!(key = %k, "evicted lru entry");
                }
                None => break,
            }
        }
    }

    /// Drop entries. `None` clears everything; `Some(prefix)` drops keys
    /// starting with the prefix. Returns the number removed.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        let mut map = write_lock(&self.map);
        match pattern {
            None => {
                let removed = map.entries.len();
                map.entries.clear();
                removed
            }
            Some(prefix) => {
                let before = map.entries.len();
                map.entries.retain(|k, _| !k.starts_with(prefix));
                before - map.entries.len()
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let config = read_lock(&self.config);
        CacheStats {
            size: read_lock(&self.map).entries.len(),
            hits,
            misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            ttl_seconds: config.ttl_seconds,
            max_entries: config.max_entries,
        }
    }

    /// Apply a partial reconfiguration. A lowered capacity takes effect on
    /// the next insert; a changed save interval on the next auto-save
    /// spawn.
    pub fn configure(&self, update: CacheConfigUpdate) {
        let mut config = write_lock(&self.config);
        if let Some(max_entries) = update.max_entries {
            config.max_entries = max_entries;
        }
        if let Some(ttl) = update.ttl_seconds {
            config.ttl_seconds = ttl;
        }
        if let Some(interval) = update.save_interval_seconds {
            config.save_interval_seconds = interval;
        }
        if let Some(dir) = update.dir {
            config.dir = dir;
        }
        if let Some(file) = update.file {
            config.file = file;
        }
    }

    /// Write an atomic snapshot (temp file, fsync, rename). Serialization
    /// happens under the snapshot lock and a clone of the entries, so
    /// concurrent readers are never blocked.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let default_path = read_lock(&self.config).snapshot_path();
        let path = path.unwrap_or(&default_path);
        let _guard: MutexGuard<'_, ()> = match self.snapshot_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        let records: Vec<SnapshotRecord> = {
            let map = read_lock(&self.map);
            map.entries
                .iter()
                .map(|(k, e)| SnapshotRecord {
                    key: k.clone(),
                    value: (*e.value).clone(),
                    created_at: e.created_at,
                })
                .collect()
        };

        let result = write_snapshot(path, &records);
        match &result {
            Ok(()) => {
                self.degraded.store(false, Ordering::Relaxed);
                debug!(path = %path.display(), entries = records.len(), "cache snapshot written");
            }
            Err(e) => {
                self.degraded.store(true, Ordering::Relaxed);
                warn!(path = %path.display(), error = %e, "cache snapshot failed; continuing in-memory only");
            }
        }
        result
    }

    /// Load a snapshot, skipping entries already past their TTL. Corrupt
    /// or version-mismatched files are logged and ignored; this never
    /// fails the caller. Returns the number of entries restored.
    pub fn load(&self, path: Option<&Path>) -> usize {
        let default_path = read_lock(&self.config).snapshot_path();
        let path = path.unwrap_or(&default_path);
        let records = match read_snapshot(path) {
            Ok(records) => records,
            Err(e) => {
                if !matches!(e, EngineError::CacheCorruption(ref detail) if detail == "missing") {
                    warn!(path = %path.display(), error = %e, "ignoring unusable cache snapshot");
                }
                return 0;
            }
        };

        let ttl = read_lock(&self.config).ttl_seconds;
        let now = unix_now();
        let mut restored = 0;
        for record in records {
            if is_expired(record.created_at, now, ttl) {
                continue;
            }
            let max_entries = read_lock(&self.config).max_entries;
            let mut map = write_lock(&self.map);
            if map.entries.len() >= max_entries {
                break;
            }
            map.tick = map.tick.wrapping_add(1);
            let tick = map.tick;
            map.entries.insert(
                record.key,
                Entry {
                    value: Arc::new(record.value),
                    created_at: record.created_at,
                    last_used: AtomicU64::new(tick),
                },
            );
            restored += 1;
        }
        debug!(path = %path.display(), restored, "cache snapshot loaded");
        restored
    }

    /// Spawn the periodic auto-save task. Returns `None` when the cache is
    /// disabled or the interval is zero.
    pub fn spawn_auto_save(self: &Arc<Self>) -> Option<AutoSaveHandle> {
        let config = read_lock(&self.config).clone();
        if config.disabled || config.save_interval_seconds == 0 {
            return None;
        }
        let interval = Duration::from_secs(config.save_interval_seconds);
        let cache = Arc::clone(self);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("goalsim-cache-autosave".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !cache.degraded.load(Ordering::Relaxed) {
                            let _ = cache.save(None);
                        }
                    }
                    // Stop requested or the handle was dropped: one final
                    // snapshot attempt, then exit
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        let _ = cache.save(None);
                        return;
                    }
                }
            })
            .ok()?;
        Some(AutoSaveHandle { stop_tx, thread })
    }
}

/// Handle owning the auto-save background thread.
pub struct AutoSaveHandle {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl AutoSaveHandle {
    /// Stop the task, letting it attempt one final snapshot.
    pub fn shutdown(self) {
        let _ = self.stop_tx.send(());
        let _ = self.thread.join();
    }
}

fn write_snapshot(path: &Path, records: &[SnapshotRecord]) -> Result<()> {
    let io_err = |e: std::io::Error| EngineError::CacheCorruption(e.to_string());
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path).map_err(io_err)?;
        file.write_all(&SNAPSHOT_MAGIC).map_err(io_err)?;
        file.write_all(&SNAPSHOT_VERSION.to_le_bytes()).map_err(io_err)?;
        file.write_all(&unix_now().to_le_bytes()).map_err(io_err)?;
        bincode::serialize_into(&mut file, records)
            .map_err(|e| EngineError::CacheCorruption(e.to_string()))?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(&tmp_path, path).map_err(io_err)
}

fn read_snapshot(path: &Path) -> Result<Vec<SnapshotRecord>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EngineError::CacheCorruption("missing".to_string()));
        }
        Err(e) => return Err(EngineError::CacheCorruption(e.to_string())),
    };

    let mut magic = [0u8; 4];
    let mut version = [0u8; 4];
    let mut created = [0u8; 8];
    file.read_exact(&mut magic)
        .and_then(|()| file.read_exact(&mut version))
        .and_then(|()| file.read_exact(&mut created))
        .map_err(|e| EngineError::CacheCorruption(format!("truncated header: {e}")))?;

    if magic != SNAPSHOT_MAGIC {
        return Err(EngineError::CacheCorruption("bad magic".to_string()));
    }
    if u32::from_le_bytes(version) != SNAPSHOT_VERSION {
        return Err(EngineError::CacheCorruption(format!(
            "unknown version {}",
            u32::from_le_bytes(version)
        )));
    }

    bincode::deserialize_from(&mut file)
        .map_err(|e| EngineError::CacheCorruption(format!("corrupt body: {e}")))
}

fn is_expired(created_at: u64, now: u64, ttl_seconds: u64) -> bool {
    now.saturating_sub(created_at) >= ttl_seconds
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
