//! Telegram Bot API client
//!
//! Blocking HTTP over `reqwest`. Every call is a JSON POST to
//! `{api_url}/bot{token}/{method}`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::types::{ApiResponse, BotIdentity, Update};
use super::BotTransport;
use crate::config::TelegramBotConfig;
use crate::error::{RelayError, Result};

/// Longest text Telegram accepts in one message (UTF-16 units; chars are
/// a safe upper bound)
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Slack on top of the long-poll timeout before giving up on a request
const REQUEST_GRACE: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl TelegramClient {
    /// Build a client. Must not be called from inside an async runtime.
    pub fn new(config: &TelegramBotConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("logrelay/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.poll_timeout_secs) + REQUEST_GRACE)
            .build()
            .map_err(|e| RelayError::Bot(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| {
                RelayError::Bot(format!("{} request failed: {}", method, e.without_url()))
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RelayError::ListenerFailure(
                "bot token rejected by the Bot API".to_string(),
            ));
        }

        let parsed: ApiResponse<T> = response.json().map_err(|e| {
            RelayError::Bot(format!("{} returned malformed JSON: {}", method, e.without_url()))
        })?;

        parse_api_response(method, parsed)
    }
}

/// Unwrap the `{ok, result}` envelope, checking `ok` first
fn parse_api_response<T>(method: &str, response: ApiResponse<T>) -> Result<T> {
    if !response.ok {
        if response.error_code == Some(401) {
            return Err(RelayError::ListenerFailure(
                "bot token rejected by the Bot API".to_string(),
            ));
        }
        return Err(RelayError::Bot(format!(
            "{} failed (code {}): {}",
            method,
            response.error_code.unwrap_or(-1),
            response.description.as_deref().unwrap_or("unknown error")
        )));
    }

    response
        .result
        .ok_or_else(|| RelayError::Bot(format!("{} returned no result", method)))
}

/// Split `text` into pieces of at most `limit` chars, breaking between
/// lines where possible
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len <= limit {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        // A single overlong line is cut wherever the limit falls
        for ch in line.chars() {
            if current_len == limit {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += 1;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl BotTransport for TelegramClient {
    fn identify(&self) -> Result<BotIdentity> {
        self.call("getMe", &json!({}))
    }

    fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout.as_secs(),
                "allowed_updates": ["message"],
            }),
        )
    }

    fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let _: Value = self.call(
                "sendMessage",
                &json!({
                    "chat_id": chat_id,
                    "text": chunk,
                }),
            )?;
        }
        Ok(())
    }
}
