//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Clean and empty logs recover fully
//! - Torn or corrupt tails are cut off at the last good entry
//! - `verify` reports the same numbers without touching the file

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use logrelay::config::WalSyncStrategy;
use logrelay::wal::{Operation, WalEntry, WalRecovery, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn write_via_writer(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("user-{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }
}

fn put(lsn: u64, key: &[u8]) -> WalEntry {
    WalEntry::new(
        lsn,
        Operation::Put {
            key: key.to_vec(),
            value: b"v".to_vec(),
        },
    )
}

/// One good entry followed by `tail`; returns the good entry's length
fn write_good_then(path: &Path, tail: &[u8]) -> u64 {
    let good = put(1, b"k").serialize().unwrap();
    let mut file = File::create(path).unwrap();
    file.write_all(&good).unwrap();
    file.write_all(tail).unwrap();
    file.sync_all().unwrap();
    good.len() as u64
}

fn corrupt_second_entry() -> Vec<u8> {
    let mut bad = put(2, b"k2").serialize().unwrap();
    if let Some(byte) = bad.last_mut() {
        *byte ^= 0xFF;
    }
    bad
}

// =============================================================================
// Clean Log Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_log() {
    let (_temp, wal_path) = setup_temp_wal();
    write_via_writer(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.lsn, (i + 1) as u64);
    }
}

#[test]
fn test_recover_preserves_operations() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer
            .append(Operation::Put { key: b"k1".to_vec(), value: b"v1".to_vec() })
            .unwrap();
        writer.append(Operation::Delete { key: b"k1".to_vec() }).unwrap();
    }

    let (entries, _) = WalRecovery::recover(&wal_path).unwrap();

    assert!(matches!(entries[0].operation, Operation::Put { .. }));
    assert_eq!(
        entries[1].operation,
        Operation::Delete { key: b"k1".to_vec() }
    );
}

// =============================================================================
// Damaged Tail Tests
// =============================================================================

#[test]
fn test_recover_partial_header_truncates_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let good_len = write_good_then(&wal_path, &[0u8; 8]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good_len);
}

#[test]
fn test_recover_partial_payload() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut torn = put(2, b"k2").serialize().unwrap();
    torn.truncate(20);
    let good_len = write_good_then(&wal_path, &torn);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good_len);
}

#[test]
fn test_recover_crc_mismatch() {
    let (_temp, wal_path) = setup_temp_wal();
    let good_len = write_good_then(&wal_path, &corrupt_second_entry());

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_recovered, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good_len);
}

#[test]
fn test_recover_corrupt_first_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut bytes = put(1, b"k").serialize().unwrap();
    bytes[20] ^= 0xFF;
    fs::write(&wal_path, &bytes).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 0);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
}

#[test]
fn test_writer_continues_after_recovery() {
    let (_temp, wal_path) = setup_temp_wal();
    write_good_then(&wal_path, &corrupt_second_entry());
    WalRecovery::recover(&wal_path).unwrap();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = writer.append(Operation::Delete { key: b"k".to_vec() }).unwrap();

    assert_eq!(lsn, 2);
    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(!result.was_truncated);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_leaves_file_untouched() {
    let (_temp, wal_path) = setup_temp_wal();
    write_good_then(&wal_path, &corrupt_second_entry());
    let before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), before);
}

#[test]
fn test_recover_and_verify_agree() {
    let (_temp, wal_path) = setup_temp_wal();
    write_via_writer(&wal_path, 20);

    let verify_result = WalRecovery::verify(&wal_path).unwrap();
    let (entries, recover_result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len() as u64, recover_result.entries_recovered);
    assert_eq!(recover_result.entries_recovered, verify_result.entries_recovered);
    assert_eq!(recover_result.last_lsn, verify_result.last_lsn);
    assert_eq!(recover_result.was_truncated, verify_result.was_truncated);
}
