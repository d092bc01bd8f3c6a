//! Tests for the user repository over a real KvStore
//!
//! These tests verify:
//! - Create/get/get_all/delete behaviour and the error contract
//! - Chat-based lookup and bulk removal
//! - Concurrent creates
//! - Behaviour once the store is closed

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use logrelay::repository::USER_PREFIX;
use logrelay::{KeyValueStore, KvStore, RelayError, User, UserReader, UserRepository, UserWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_repo() -> (TempDir, Arc<KvStore>, UserRepository) {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(KvStore::open(temp_dir.path()).unwrap());
    let repo = UserRepository::new(Arc::clone(&store));
    (temp_dir, store, repo)
}

fn user(id: &str, chat: i64) -> User {
    User {
        id: id.to_string(),
        external_chat_id: chat,
    }
}

// =============================================================================
// Create / Get Tests
// =============================================================================

#[test]
fn test_create_then_get() {
    let (_temp, store, repo) = setup_repo();

    repo.create(&user("abc", 42)).unwrap();

    assert_eq!(repo.get("abc").unwrap(), user("abc", 42));
    assert_eq!(
        store.get(b"user-abc").unwrap(),
        br#"{"id":"abc","externalChatId":42}"#
    );
}

#[test]
fn test_create_is_upsert() {
    let (_temp, _store, repo) = setup_repo();

    repo.create(&user("abc", 1)).unwrap();
    repo.create(&user("abc", 2)).unwrap();

    assert_eq!(repo.get("abc").unwrap().external_chat_id, 2);
    assert_eq!(repo.get_all().unwrap().len(), 1);
}

#[test]
fn test_get_unknown_and_empty_ids() {
    let (_temp, _store, repo) = setup_repo();

    assert!(matches!(repo.get("nope"), Err(RelayError::NotFound)));
    assert!(matches!(repo.get(""), Err(RelayError::EmptyId)));
}

#[test]
fn test_get_all_empty_store() {
    let (_temp, _store, repo) = setup_repo();
    assert!(repo.get_all().unwrap().is_empty());
}

#[test]
fn test_get_all_ascending_key_order() {
    let (_temp, _store, repo) = setup_repo();
    repo.create(&user("c", 3)).unwrap();
    repo.create(&user("a", 1)).unwrap();
    repo.create(&user("b", 2)).unwrap();

    let ids: Vec<String> = repo.get_all().unwrap().into_iter().map(|u| u.id).collect();

    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_get_all_ignores_other_namespaces() {
    let (_temp, store, repo) = setup_repo();
    repo.create(&user("a", 1)).unwrap();
    store.put(b"session-xyz", b"not json at all").unwrap();

    assert_eq!(repo.get_all().unwrap().len(), 1);
}

#[test]
fn test_corrupt_record_fails_get_all_but_not_find() {
    let (_temp, store, repo) = setup_repo();
    repo.create(&user("good", 7)).unwrap();
    store.put(format!("{}bad", USER_PREFIX).as_bytes(), b"{broken").unwrap();

    assert!(matches!(repo.get_all(), Err(RelayError::CorruptRecord(_))));
    assert!(matches!(repo.get("bad"), Err(RelayError::CorruptRecord(_))));
    assert_eq!(repo.find_by_external_chat_id(7).unwrap().id, "good");
}

// =============================================================================
// Chat Lookup Tests
// =============================================================================

#[test]
fn test_find_by_chat() {
    let (_temp, _store, repo) = setup_repo();
    repo.create(&user("abc", 42)).unwrap();
    repo.create(&user("def", 43)).unwrap();

    assert_eq!(repo.find_by_external_chat_id(42).unwrap().id, "abc");
    assert!(matches!(
        repo.find_by_external_chat_id(99),
        Err(RelayError::NotFound)
    ));
    assert!(matches!(
        repo.find_by_external_chat_id(0),
        Err(RelayError::EmptyChatId)
    ));
}

#[test]
fn test_find_by_chat_smallest_key_wins() {
    let (_temp, _store, repo) = setup_repo();
    repo.create(&user("zzz", 5)).unwrap();
    repo.create(&user("mmm", 5)).unwrap();
    repo.create(&user("aaa", 6)).unwrap();

    assert_eq!(repo.find_by_external_chat_id(5).unwrap().id, "mmm");
}

#[test]
fn test_find_by_negative_chat_id() {
    let (_temp, _store, repo) = setup_repo();
    repo.create(&user("group", -1001234567890)).unwrap();

    assert_eq!(
        repo.find_by_external_chat_id(-1001234567890).unwrap().id,
        "group"
    );
}

#[test]
fn test_find_by_chat_reads_only_up_to_the_match() {
    let (temp, store, repo) = setup_repo();
    let first = user("a", 42);
    repo.create(&first).unwrap();
    for i in 0..50 {
        repo.create(&user(&format!("b{:02}", i), 7)).unwrap();
    }
    store.flush().unwrap();

    // Lose every record after the first one from the flushed table
    let record = serde_json::to_vec(&first).unwrap();
    let key_len = USER_PREFIX.len() + first.id.len();
    let first_record_end = 14 + 8 + key_len + record.len();
    let table = temp.path().join("sstables").join("sstable_000001.sst");
    std::fs::OpenOptions::new()
        .write(true)
        .open(&table)
        .unwrap()
        .set_len(first_record_end as u64)
        .unwrap();

    assert_eq!(repo.find_by_external_chat_id(42).unwrap(), first);
    assert!(matches!(
        repo.find_by_external_chat_id(7),
        Err(RelayError::StorageUnavailable(_))
    ));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete() {
    let (_temp, _store, repo) = setup_repo();
    repo.create(&user("abc", 42)).unwrap();

    repo.delete("abc").unwrap();

    assert!(matches!(repo.get("abc"), Err(RelayError::NotFound)));
    assert!(matches!(repo.delete("abc"), Err(RelayError::NotFound)));
    assert!(matches!(repo.delete(""), Err(RelayError::EmptyId)));
}

#[test]
fn test_delete_all_by_chat_removes_only_that_chat() {
    let (_temp, _store, repo) = setup_repo();
    repo.create(&user("u1", 9)).unwrap();
    repo.create(&user("u2", 9)).unwrap();
    repo.create(&user("u3", 10)).unwrap();

    repo.delete_all_by_external_chat_id(9).unwrap();

    let remaining = repo.get_all().unwrap();
    assert_eq!(remaining, vec![user("u3", 10)]);
    assert!(matches!(
        repo.find_by_external_chat_id(9),
        Err(RelayError::NotFound)
    ));
}

#[test]
fn test_delete_all_by_chat_is_repeatable() {
    let (_temp, _store, repo) = setup_repo();
    repo.create(&user("u1", 9)).unwrap();

    repo.delete_all_by_external_chat_id(9).unwrap();
    repo.delete_all_by_external_chat_id(9).unwrap();
    repo.delete_all_by_external_chat_id(12345).unwrap();

    assert!(matches!(
        repo.delete_all_by_external_chat_id(0),
        Err(RelayError::EmptyChatId)
    ));
}

// =============================================================================
// Registration Flow
// =============================================================================

#[test]
fn test_reregistration_replaces_previous_user() {
    let (_temp, _store, repo) = setup_repo();
    let first = User::register(42);
    repo.create(&first).unwrap();

    repo.delete_all_by_external_chat_id(42).unwrap();
    let second = User::register(42);
    repo.create(&second).unwrap();

    assert_ne!(first.id, second.id);
    assert!(matches!(repo.get(&first.id), Err(RelayError::NotFound)));
    assert_eq!(repo.find_by_external_chat_id(42).unwrap(), second);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_creates() {
    let (_temp, _store, repo) = setup_repo();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let repo = repo.clone();
            thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        let u = User::register(1000 + t * 10 + i);
                        repo.create(&u).unwrap();
                        u.id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut created = HashSet::new();
    for handle in handles {
        created.extend(handle.join().unwrap());
    }

    let stored: HashSet<String> = repo.get_all().unwrap().into_iter().map(|u| u.id).collect();
    assert_eq!(created.len(), 80);
    assert_eq!(stored, created);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_closed_store_surfaces_engine_closed() {
    let (_temp, store, repo) = setup_repo();
    repo.create(&user("abc", 42)).unwrap();

    store.close().unwrap();

    assert!(matches!(repo.get("abc"), Err(RelayError::EngineClosed)));
    assert!(matches!(repo.get_all(), Err(RelayError::EngineClosed)));
    assert!(matches!(
        repo.find_by_external_chat_id(42),
        Err(RelayError::EngineClosed)
    ));
    assert!(matches!(
        repo.create(&user("x", 1)),
        Err(RelayError::EngineClosed)
    ));
}

#[test]
fn test_users_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let registered = User::register(42);
    {
        let store = Arc::new(KvStore::open(temp_dir.path()).unwrap());
        UserRepository::new(Arc::clone(&store))
            .create(&registered)
            .unwrap();
        store.close().unwrap();
    }

    let store = Arc::new(KvStore::open(temp_dir.path()).unwrap());
    let repo = UserRepository::new(store);

    assert_eq!(repo.get(&registered.id).unwrap(), registered);
}
