//! Storage Module
//!
//! Persistent storage layer using an SSTable format.
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Point lookups and prefix scans
//! - Full compaction when the table count grows
//!
//! Files are written as `sstable_NNNNNN.tmp` and renamed to `.sst` once
//! complete, so a crash mid-flush never leaves a half-written table behind.

mod manager;
mod sstable;

pub use manager::StorageManager;
pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
