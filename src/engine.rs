//! Engine Module
//!
//! The ordered key-value engine that coordinates WAL, MemTable and Storage.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Isolate readers from writers (one short transaction per call)
//! - Trigger flushes when MemTable is full, compaction when SSTables pile up
//! - Manage crash recovery on startup

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::{StorageConfig, WalSyncStrategy};
use crate::error::Result;
use crate::memtable::MemTable;
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// A key and its live value
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Tuning knobs for [`Engine::open`]
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub data_dir: PathBuf,
    pub wal_sync_strategy: WalSyncStrategy,
    pub memtable_size_limit: usize,
    /// Compact once this many SSTables exist (0 disables)
    pub compaction_threshold: usize,
}

impl EngineOptions {
    /// Defaults for everything but the directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::from(&StorageConfig {
            data_dir: data_dir.into(),
            ..StorageConfig::default()
        })
    }
}

impl From<&StorageConfig> for EngineOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            wal_sync_strategy: config.wal_sync_strategy(),
            memtable_size_limit: config.memtable_size_limit,
            compaction_threshold: config.compaction_threshold,
        }
    }
}

/// The storage engine
///
/// ## Concurrency Model: transactions over a reader/writer lock
///
/// - **Writes** (put/delete/flush/compact): hold `txn_lock` exclusively.
///   Order inside: WAL → memtable → (maybe) flush → (maybe) compact.
/// - **Reads** (get/scan): hold `txn_lock` shared. Many readers run at once,
///   and none of them can observe a write or a flush half-way through.
pub struct Engine {
    options: EngineOptions,

    /// Directory for SSTables
    storage_dir: PathBuf,

    /// Write-ahead log for durability
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes
    memtable: MemTable,

    /// Persistent storage manager
    storage: StorageManager,

    /// Shared for reads, exclusive for writes
    txn_lock: RwLock<()>,
}

impl Engine {
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Replay the WAL, flush what it held, then truncate it
    /// 4. Ready to serve requests
    pub fn open(options: EngineOptions) -> Result<Self> {
        fs::create_dir_all(&options.data_dir)?;

        let storage_dir = options.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = options.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery finished"
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Delete { key } => {
                        memtable.delete(key);
                    }
                }
            }

            // Make recovered data durable in an SSTable before dropping the WAL
            if !memtable.is_empty() {
                tracing::debug!(entries = memtable.entry_count(), "flushing recovered entries");
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, options.wal_sync_strategy)?;
        wal.truncate()?;

        Ok(Self {
            options,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            txn_lock: RwLock::new(()),
        })
    }

    /// Open with a path, default options otherwise
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(EngineOptions::new(path))
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _txn = self.txn_lock.read();
        self.get_locked(key)
    }

    fn get_locked(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.into_value());
        }
        self.storage.get(key)
    }

    /// Live entries under `prefix` in ascending key order
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        self.scan_prefix_filter(prefix, &mut |_, _| true, None)
    }

    /// Live entries under `prefix` accepted by `predicate`, ascending key
    /// order, stopping after `limit` matches.
    ///
    /// Keys from the memtable and every SSTable index are merged before any
    /// value is read; SSTable values are then read one key at a time, so
    /// the scan ends as soon as the limit is reached.
    pub fn scan_prefix_filter(
        &self,
        prefix: &[u8],
        predicate: &mut dyn FnMut(&[u8], &[u8]) -> bool,
        limit: Option<usize>,
    ) -> Result<Vec<KvPair>> {
        let mut matches = Vec::new();
        if limit == Some(0) {
            return Ok(matches);
        }

        let _txn = self.txn_lock.read();

        let newer = self
            .memtable
            .scan_prefix(prefix)
            .into_iter()
            .map(|(key, entry)| (key, entry.into_value()))
            .collect();

        self.storage.scan_prefix_with(prefix, newer, &mut |key, value| {
            if predicate(&key, &value) {
                matches.push((key, value));
            }
            limit.map_or(true, |n| matches.len() < n)
        })?;

        Ok(matches)
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _txn = self.txn_lock.write();

        self.wal.lock().append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;

        let new_size = self.memtable.put(key.to_vec(), value.to_vec());
        self.maybe_flush(new_size)
    }

    /// Delete a key. Returns whether a live value existed.
    ///
    /// Absent keys are left alone (no tombstone is written).
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let _txn = self.txn_lock.write();

        if self.get_locked(key)?.is_none() {
            return Ok(false);
        }

        self.wal.lock().append(Operation::Delete { key: key.to_vec() })?;

        let new_size = self.memtable.delete(key.to_vec());
        self.maybe_flush(new_size)?;
        Ok(true)
    }

    fn maybe_flush(&self, memtable_size: usize) -> Result<()> {
        if memtable_size >= self.options.memtable_size_limit {
            self.flush_locked()?;
        }
        Ok(())
    }

    /// Flush memtable to disk regardless of its size
    pub fn flush(&self) -> Result<()> {
        let _txn = self.txn_lock.write();
        self.flush_locked()
    }

    /// Called with `txn_lock` held for writing
    fn flush_locked(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        self.wal.lock().truncate()?;

        let threshold = self.options.compaction_threshold;
        if threshold > 0 && self.storage.sstable_count() >= threshold {
            self.storage.compact()?;
        }

        Ok(())
    }

    /// Merge all SSTables into one
    pub fn compact(&self) -> Result<()> {
        let _txn = self.txn_lock.write();
        self.storage.compact()?;
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs the WAL.
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.options.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }
}
