//! Bot API payloads
//!
//! Only the fields the relay reads; everything else in an update is ignored.

use serde::Deserialize;

/// Envelope around every Bot API result
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,

    pub result: Option<T>,

    #[serde(default)]
    pub error_code: Option<i64>,

    #[serde(default)]
    pub description: Option<String>,
}

/// The bot's own account, from `getMe`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub id: i64,

    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,

    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub chat: Chat,

    #[serde(default)]
    pub from: Option<Sender>,

    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub username: Option<String>,
}

impl Update {
    /// A text message update, as handed to command handlers
    pub fn text_message(update_id: i64, chat_id: i64, text: &str) -> Self {
        Self {
            update_id,
            message: Some(Message {
                chat: Chat { id: chat_id },
                from: None,
                text: Some(text.to_string()),
            }),
        }
    }
}
