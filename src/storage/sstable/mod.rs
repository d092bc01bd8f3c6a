//! SSTables
//!
//! Immutable sorted files produced by memtable flushes and compaction,
//! named `sstable_NNNNNN.sst`. A reader loads the whole key index into
//! memory on open and verifies the data CRC before serving lookups.
//!
//! ```text
//! header  "LRKV" | version u16 | count u64                    14 bytes
//! data    [key_len u32][val_len u32][key][value]   per entry, sorted
//! index   [key_len u32][offset u64][key]           per entry
//! footer  index_offset u64 | data_crc u32 | pad u32           16 bytes
//! ```
//!
//! `val_len == u32::MAX` is a tombstone and carries no value bytes.
//! All integers are little-endian.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

/// Magic bytes identifying a logrelay SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"LRKV";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Sentinel value indicating a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Metadata returned by [`SSTableBuilder::finish`]
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of entries in this SSTable
    pub entry_count: u64,
    /// Smallest key
    pub min_key: Vec<u8>,
    /// Largest key
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}

/// Little-endian u32 at `pos`; callers bounds-check first
pub(crate) fn read_u32(buf: &[u8], pos: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[pos..pos + 4]);
    u32::from_le_bytes(raw)
}

/// Little-endian u64 at `pos`; callers bounds-check first
pub(crate) fn read_u64(buf: &[u8], pos: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[pos..pos + 8]);
    u64::from_le_bytes(raw)
}
