//! User repository over a [`KeyValueStore`]

use std::sync::Arc;

use super::codec::{self, USER_PREFIX};
use super::{UserReader, UserWriter};
use crate::engine::KvPair;
use crate::error::{RelayError, Result};
use crate::kv::{KeyValueStore, KvStore};
use crate::model::User;

/// Maps User operations onto store primitives.
///
/// Holds a shared handle to the store and never closes it.
pub struct UserRepository<S: KeyValueStore + ?Sized = KvStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> Clone for UserRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore + ?Sized> UserRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Records whose chat matches, ascending key order
    fn scan_by_chat(&self, chat_id: i64, limit: Option<usize>) -> Result<Vec<KvPair>> {
        let mut predicate = |_key: &[u8], value: &[u8]| {
            // Undecodable records never match; get_all is where they surface
            codec::deserialize::<User>(value)
                .map(|user| user.external_chat_id == chat_id)
                .unwrap_or(false)
        };

        self.store
            .scan_prefix_filter(USER_PREFIX.as_bytes(), &mut predicate, limit)
    }
}

impl<S: KeyValueStore + ?Sized> UserReader for UserRepository<S> {
    fn get(&self, id: &str) -> Result<User> {
        if id.is_empty() {
            return Err(RelayError::EmptyId);
        }

        let bytes = self.store.get(&codec::encode_key(USER_PREFIX, id))?;
        codec::deserialize(&bytes)
    }

    fn get_all(&self) -> Result<Vec<User>> {
        self.store
            .scan_prefix(USER_PREFIX.as_bytes())?
            .iter()
            .map(|(_, value)| codec::deserialize(value))
            .collect()
    }

    fn find_by_external_chat_id(&self, chat_id: i64) -> Result<User> {
        if chat_id == 0 {
            return Err(RelayError::EmptyChatId);
        }

        let (_, value) = self
            .scan_by_chat(chat_id, Some(1))?
            .into_iter()
            .next()
            .ok_or(RelayError::NotFound)?;

        codec::deserialize(&value)
    }
}

impl<S: KeyValueStore + ?Sized> UserWriter for UserRepository<S> {
    fn create(&self, user: &User) -> Result<()> {
        if user.id.is_empty() {
            return Err(RelayError::EmptyId);
        }

        let value = codec::serialize(user)?;
        self.store.put(&codec::encode_key(USER_PREFIX, &user.id), &value)
    }

    fn delete(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(RelayError::EmptyId);
        }

        self.store.delete(&codec::encode_key(USER_PREFIX, id))
    }

    fn delete_all_by_external_chat_id(&self, chat_id: i64) -> Result<()> {
        if chat_id == 0 {
            return Err(RelayError::EmptyChatId);
        }

        let matches = self.scan_by_chat(chat_id, None)?;
        let matched = matches.len();

        for (key, _) in matches {
            match self.store.delete(&key) {
                Ok(()) | Err(RelayError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(chat_id, removed = matched, "deleted users for chat");
        Ok(())
    }
}
