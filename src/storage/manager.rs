//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Merge SSTable indexes for prefix scans, reading values lazily
//! - Create new SSTables from MemTable flushes
//! - Compact all SSTables into one

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{RelayError, Result};
use crate::memtable::MemTable;

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Newest version of a key during a prefix scan
enum Located {
    /// Supplied by the caller, `None` = tombstone
    Pending(Option<Vec<u8>>),
    /// Index into the newest-first table list
    Table(usize),
}

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self`
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files (leftover `.tmp` files are removed)
    /// 3. Open readers for each (validates and loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();

        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }

            if file_path.extension().is_some_and(|ext| ext == "tmp") {
                tracing::warn!(path = %file_path.display(), "removing unfinished SSTable");
                fs::remove_file(&file_path)?;
                continue;
            }

            if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let sstables = sstable_ids
            .iter()
            .map(|&id| SSTableReader::open(&Self::sstable_path_with_dir(path, id)))
            .collect::<Result<Vec<_>>>()?;

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(
            dir = %path.display(),
            sstables = sstables.len(),
            next_id,
            "storage opened"
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key not found, or found tombstone (deleted)
    ///
    /// Note: Uses write lock because SSTableReader reads move the file cursor.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }

            if let Some(value) = reader.get(key)? {
                return Ok(value);
            }
        }

        Ok(None)
    }

    /// Walk the live entries under `prefix` in ascending key order until
    /// `visit` returns false.
    ///
    /// `newer` holds versions that shadow every table (the memtable), with
    /// `None` for a tombstone. Keys are merged from the in-memory indexes
    /// first; a value is read from disk only when its key is reached, so
    /// stopping early never touches the rest of the range.
    pub fn scan_prefix_with(
        &self,
        prefix: &[u8],
        newer: Vec<(Vec<u8>, Option<Vec<u8>>)>,
        visit: &mut dyn FnMut(Vec<u8>, Vec<u8>) -> bool,
    ) -> Result<()> {
        let mut sstables = self.sstables.write();

        // Newest holder of each key; oldest table first so newer ones overwrite
        let mut located: BTreeMap<Vec<u8>, Located> = BTreeMap::new();
        for (idx, reader) in sstables.iter().enumerate().rev() {
            for key in reader.keys_with_prefix(prefix) {
                located.insert(key, Located::Table(idx));
            }
        }
        for (key, value) in newer {
            located.insert(key, Located::Pending(value));
        }

        for (key, location) in located {
            let value = match location {
                Located::Pending(value) => value,
                Located::Table(idx) => sstables[idx].get(&key)?.flatten(),
            };

            if let Some(value) = value {
                if !visit(key, value) {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Creates a new SSTable file from the MemTable's sorted entries,
    /// opens a reader for it, and adds it to the front of the list.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(RelayError::Storage("Cannot flush empty MemTable".to_string()));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);

        let metadata = self.write_sstable(id, |builder| {
            for (key, entry) in memtable.iter() {
                builder.add_entry(&key, entry.into_value().as_deref())?;
            }
            Ok(())
        })?;

        let reader = SSTableReader::open(&metadata.path)?;
        self.sstables.write().insert(0, reader);

        tracing::debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "memtable flushed"
        );

        Ok(metadata)
    }

    /// Merge every SSTable into a single new one.
    ///
    /// The result covers the whole key space, so tombstones are dropped.
    /// Returns `None` when there was nothing to compact.
    pub fn compact(&self) -> Result<Option<SSTable>> {
        let mut sstables = self.sstables.write();
        if sstables.len() < 2 {
            return Ok(None);
        }

        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        for reader in sstables.iter_mut().rev() {
            for item in reader.iter()? {
                let (key, value) = item?;
                merged.insert(key, value);
            }
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let metadata = self.write_sstable(id, |builder| {
            for (key, value) in merged.iter() {
                if let Some(v) = value {
                    builder.add(key, v)?;
                }
            }
            Ok(())
        })?;

        let reader = SSTableReader::open(&metadata.path)?;
        let old: Vec<SSTableReader> = std::mem::replace(&mut *sstables, vec![reader]);

        let replaced = old.len();
        for table in old {
            let path = table.path().to_path_buf();
            drop(table);
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove compacted SSTable");
            }
        }

        tracing::info!(
            id,
            replaced,
            entries = metadata.entry_count,
            "SSTables compacted"
        );

        Ok(Some(metadata))
    }

    /// Build SSTable `id` through a temp file renamed into place once complete
    fn write_sstable<F>(&self, id: u64, fill: F) -> Result<SSTable>
    where
        F: FnOnce(&mut SSTableBuilder) -> Result<()>,
    {
        let final_path = self.sstable_path(id);
        let tmp_path = final_path.with_extension("tmp");

        let mut builder = SSTableBuilder::new(&tmp_path)?;
        fill(&mut builder)?;
        let mut metadata = builder.finish()?;

        fs::rename(&tmp_path, &final_path)?;
        metadata.path = final_path;
        Ok(metadata)
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        name.strip_prefix("sstable_")?.parse().ok()
    }
}
