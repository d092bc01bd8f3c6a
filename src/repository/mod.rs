//! Repository Module
//!
//! Entity-level reads and writes on top of the key-value store.
//!
//! The store has no tables: every entity type owns a key prefix (see
//! [`codec::NAMESPACES`]). Lookups by a secondary field are a filtered scan
//! of the whole namespace, fine while the number of users stays small.

pub mod codec;
mod user;

pub use codec::{NAMESPACES, USER_PREFIX};
pub use user::UserRepository;

use crate::error::Result;
use crate::model::User;

/// Read side of the user repository
pub trait UserReader: Send + Sync {
    /// User by primary key. `EmptyId` for `""`, `NotFound` if absent.
    fn get(&self, id: &str) -> Result<User>;

    /// Every stored user, ascending key order. One undecodable record fails
    /// the whole call with `CorruptRecord`.
    fn get_all(&self) -> Result<Vec<User>>;

    /// The user registered from `chat_id`. When several exist, the one with
    /// the smallest key is returned.
    fn find_by_external_chat_id(&self, chat_id: i64) -> Result<User>;
}

/// Write side of the user repository
pub trait UserWriter: Send + Sync {
    /// Upsert under the user's ID
    fn create(&self, user: &User) -> Result<()>;

    /// Remove by ID. `NotFound` if absent.
    fn delete(&self, id: &str) -> Result<()>;

    /// Remove every user registered from `chat_id`. Zero matches is fine.
    fn delete_all_by_external_chat_id(&self, chat_id: i64) -> Result<()>;
}

/// Both halves, for handlers that need to read and write
pub trait UserStore: UserReader + UserWriter {}

impl<T: UserReader + UserWriter> UserStore for T {}
