//! Tests for StorageManager
//!
//! These tests verify:
//! - Opening and discovering SSTables
//! - Flushing memtables and reading back newest-first
//! - Merged prefix scans across tables
//! - Full compaction
//! - Persistence across restart

use std::fs;

use logrelay::memtable::MemTable;
use logrelay::storage::StorageManager;
use logrelay::RelayError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memtable_with(entries: &[(&str, Option<&str>)]) -> MemTable {
    let memtable = MemTable::new();
    for (key, value) in entries {
        match value {
            Some(v) => memtable.put(key.as_bytes().to_vec(), v.as_bytes().to_vec()),
            None => memtable.delete(key.as_bytes().to_vec()),
        };
    }
    memtable
}

fn sst_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".sst"))
        .collect();
    names.sort();
    names
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("storage");

    let storage = StorageManager::open(&dir).unwrap();

    assert!(dir.is_dir());
    assert_eq!(storage.sstable_count(), 0);
    assert_eq!(storage.data_dir(), dir.as_path());
}

#[test]
fn test_open_removes_unfinished_tables_and_ignores_other_files() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("sstable_000009.tmp"), b"half written").unwrap();
    fs::write(temp.path().join("notes.txt"), b"hello").unwrap();

    let storage = StorageManager::open(temp.path()).unwrap();

    assert_eq!(storage.sstable_count(), 0);
    assert!(!temp.path().join("sstable_000009.tmp").exists());
    assert!(temp.path().join("notes.txt").exists());
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_creates_sstable() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();

    let sstable = storage
        .flush(&memtable_with(&[("a", Some("1")), ("b", None)]))
        .unwrap();

    assert_eq!(sstable.entry_count(), 2);
    assert_eq!(storage.sstable_count(), 1);
    assert_eq!(sst_files(temp.path()), vec!["sstable_000001.sst"]);
}

#[test]
fn test_flush_empty_memtable_fails() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();

    assert!(matches!(
        storage.flush(&MemTable::new()),
        Err(RelayError::Storage(_))
    ));
    assert_eq!(storage.sstable_count(), 0);
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_get_newest_table_wins() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();
    storage
        .flush(&memtable_with(&[("k", Some("old")), ("only-old", Some("x"))]))
        .unwrap();
    storage.flush(&memtable_with(&[("k", Some("new"))])).unwrap();

    assert_eq!(storage.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(storage.get(b"only-old").unwrap(), Some(b"x".to_vec()));
    assert_eq!(storage.get(b"missing").unwrap(), None);
}

#[test]
fn test_get_tombstone_hides_older_value() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();
    storage.flush(&memtable_with(&[("k", Some("v"))])).unwrap();
    storage.flush(&memtable_with(&[("k", None)])).unwrap();

    assert_eq!(storage.get(b"k").unwrap(), None);
}

/// Everything `scan_prefix_with` visits, as (key, value) strings
fn collect_prefix(
    storage: &StorageManager,
    prefix: &str,
    newer: Vec<(Vec<u8>, Option<Vec<u8>>)>,
) -> Vec<(String, String)> {
    let mut seen = Vec::new();
    storage
        .scan_prefix_with(prefix.as_bytes(), newer, &mut |k, v| {
            seen.push((
                String::from_utf8(k).unwrap(),
                String::from_utf8(v).unwrap(),
            ));
            true
        })
        .unwrap();
    seen
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[test]
fn test_scan_prefix_merges_tables() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();
    storage
        .flush(&memtable_with(&[
            ("user-1", Some("one")),
            ("user-2", Some("two")),
            ("zzz", Some("other")),
        ]))
        .unwrap();
    storage
        .flush(&memtable_with(&[("user-2", None), ("user-3", Some("three"))]))
        .unwrap();

    assert_eq!(
        collect_prefix(&storage, "user-", Vec::new()),
        vec![pair("user-1", "one"), pair("user-3", "three")]
    );
}

#[test]
fn test_scan_prefix_newer_entries_shadow_tables() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();
    storage
        .flush(&memtable_with(&[("user-1", Some("old")), ("user-2", Some("two"))]))
        .unwrap();

    let newer = vec![
        (b"user-0".to_vec(), Some(b"zero".to_vec())),
        (b"user-1".to_vec(), Some(b"new".to_vec())),
        (b"user-2".to_vec(), None),
    ];

    assert_eq!(
        collect_prefix(&storage, "user-", newer),
        vec![pair("user-0", "zero"), pair("user-1", "new")]
    );
}

#[test]
fn test_scan_prefix_stops_when_visitor_declines() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();
    storage
        .flush(&memtable_with(&[
            ("user-1", Some("a")),
            ("user-2", Some("b")),
            ("user-3", Some("c")),
        ]))
        .unwrap();

    let mut visited = Vec::new();
    storage
        .scan_prefix_with(b"user-", Vec::new(), &mut |k, _| {
            visited.push(k);
            visited.len() < 2
        })
        .unwrap();

    assert_eq!(visited, vec![b"user-1".to_vec(), b"user-2".to_vec()]);
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_compact_needs_two_tables() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();
    assert!(storage.compact().unwrap().is_none());

    storage.flush(&memtable_with(&[("a", Some("1"))])).unwrap();
    assert!(storage.compact().unwrap().is_none());
    assert_eq!(storage.sstable_count(), 1);
}

#[test]
fn test_compact_merges_and_drops_tombstones() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(temp.path()).unwrap();
    storage
        .flush(&memtable_with(&[("a", Some("1")), ("b", Some("2"))]))
        .unwrap();
    storage
        .flush(&memtable_with(&[("a", Some("1b")), ("c", Some("3"))]))
        .unwrap();
    storage.flush(&memtable_with(&[("b", None)])).unwrap();

    let compacted = storage.compact().unwrap().unwrap();

    assert_eq!(compacted.entry_count(), 2);
    assert_eq!(storage.sstable_count(), 1);
    assert_eq!(sst_files(temp.path()), vec!["sstable_000004.sst"]);
    assert_eq!(storage.get(b"a").unwrap(), Some(b"1b".to_vec()));
    assert_eq!(storage.get(b"b").unwrap(), None);
    assert_eq!(storage.get(b"c").unwrap(), Some(b"3".to_vec()));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_persistence_across_restart() {
    let temp = TempDir::new().unwrap();
    {
        let storage = StorageManager::open(temp.path()).unwrap();
        storage.flush(&memtable_with(&[("k", Some("old"))])).unwrap();
        storage
            .flush(&memtable_with(&[("k", Some("new")), ("gone", None)]))
            .unwrap();
    }

    let storage = StorageManager::open(temp.path()).unwrap();

    assert_eq!(storage.sstable_count(), 2);
    assert_eq!(storage.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(storage.get(b"gone").unwrap(), None);
}

#[test]
fn test_sstable_ids_continue_after_restart() {
    let temp = TempDir::new().unwrap();
    {
        let storage = StorageManager::open(temp.path()).unwrap();
        storage.flush(&memtable_with(&[("a", Some("1"))])).unwrap();
        storage.flush(&memtable_with(&[("b", Some("2"))])).unwrap();
    }

    let storage = StorageManager::open(temp.path()).unwrap();
    storage.flush(&memtable_with(&[("c", Some("3"))])).unwrap();

    assert_eq!(
        sst_files(temp.path()),
        vec![
            "sstable_000001.sst",
            "sstable_000002.sst",
            "sstable_000003.sst"
        ]
    );
}

#[test]
fn test_open_rejects_damaged_table() {
    let temp = TempDir::new().unwrap();
    {
        let storage = StorageManager::open(temp.path()).unwrap();
        storage.flush(&memtable_with(&[("a", Some("1"))])).unwrap();
    }
    let path = temp.path().join("sstable_000001.sst");
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'X';
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        StorageManager::open(temp.path()),
        Err(RelayError::Storage(_))
    ));
}
