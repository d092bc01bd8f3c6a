//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups and prefix scans via
//! the in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::error::{RelayError, Result};

use super::iterator::SSTableIterator;
use super::{read_u32, read_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading entries
    pub(super) file: BufReader<File>,
    /// key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Start of the index block (end of the data block)
    pub(super) index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header and data checksum, then loads the index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(RelayError::Storage(format!(
                "SSTable {} too small ({} bytes)",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(RelayError::Storage(format!(
                "Invalid SSTable magic in {}: got {:?}",
                path.display(),
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(RelayError::Storage(format!(
                "Unsupported SSTable version {} in {}",
                version,
                path.display()
            )));
        }

        let entry_count = read_u64(&header, 6);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer, 0);
        let data_crc = read_u32(&footer, 8);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(RelayError::Storage(format!(
                "SSTable {} has invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        Self::verify_data_crc(&mut file, index_offset, data_crc, path)?;

        let index = Self::load_index(&mut file, index_offset, file_size - FOOTER_SIZE)?;
        if index.len() as u64 != entry_count {
            return Err(RelayError::Storage(format!(
                "SSTable {} index has {} keys, header says {}",
                path.display(),
                index.len(),
                entry_count
            )));
        }

        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
        })
    }

    fn verify_data_crc(file: &mut File, index_offset: u64, expected: u32, path: &Path) -> Result<()> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = index_offset - HEADER_SIZE;
        let mut chunk = vec![0u8; 64 * 1024];

        while remaining > 0 {
            let n = remaining.min(chunk.len() as u64) as usize;
            file.read_exact(&mut chunk[..n])?;
            hasher.update(&chunk[..n]);
            remaining -= n as u64;
        }

        let actual = hasher.finalize();
        if actual != expected {
            return Err(RelayError::Storage(format!(
                "SSTable {} data CRC mismatch: stored {:08x}, computed {:08x}",
                path.display(),
                expected,
                actual
            )));
        }
        Ok(())
    }

    /// Parse `[key_len(4)][offset(8)][key]` records between the two offsets
    fn load_index(file: &mut File, start: u64, end: u64) -> Result<BTreeMap<Vec<u8>, u64>> {
        file.seek(SeekFrom::Start(start))?;
        let mut data = vec![0u8; (end - start) as usize];
        file.read_exact(&mut data)?;

        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < data.len() {
            if pos + 12 > data.len() {
                return Err(RelayError::Storage("truncated SSTable index entry".to_string()));
            }
            let key_len = read_u32(&data, pos) as usize;
            let offset = read_u64(&data, pos + 4);
            pos += 12;

            if pos + key_len > data.len() {
                return Err(RelayError::Storage("truncated SSTable index key".to_string()));
            }
            index.insert(data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        Ok(index)
    }

    /// Get a value by key, O(log n) lookup via in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(Some(value)))`: key found with value
    /// - `Ok(Some(None))`: key found but is a tombstone (deleted)
    /// - `Ok(None)`: key not in this SSTable
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Option<Vec<u8>>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        let (_, value) = self.read_entry_at(offset)?;
        Ok(Some(value))
    }

    /// Keys starting with `prefix`, in key order, from the in-memory index.
    /// Tombstoned keys are included; nothing is read from disk.
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.index
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn read_entry_at(&mut self, offset: u64) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;
        let key_len = read_u32(&header, 0) as usize;
        let val_len = read_u32(&header, 4);

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;

        if val_len == TOMBSTONE_MARKER {
            return Ok((key, None));
        }

        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;
        Ok((key, Some(value)))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Path of the file backing this reader
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Quick check if a key might be in this SSTable (range check)
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.index.keys().next(), self.index.keys().next_back()) {
            (Some(min), Some(max)) => key >= min.as_slice() && key <= max.as_slice(),
            _ => false,
        }
    }

    /// Create an iterator over all entries (for compaction)
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset)
    }
}
