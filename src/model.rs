//! Domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered log recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Primary key, handed to the user as their `X-ID`
    pub id: String,

    /// Telegram chat the user registered from
    pub external_chat_id: i64,
}

impl User {
    /// A new user with a freshly generated ID
    pub fn register(external_chat_id: i64) -> Self {
        Self {
            id: generate_user_id(),
            external_chat_id,
        }
    }
}

/// Random 36-character hyphenated UUID v4
pub fn generate_user_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
