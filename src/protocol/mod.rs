//! Protocol Module
//!
//! Defines what clients send to the relay endpoint and what they get back.
//!
//! ## Request
//! ```text
//! POST /
//! X-ID: <user id>
//! Content-Type: application/json
//!
//! {"caller", "time", "level", "message", "error",
//!  "requestID", "traceID", "spanID", "data": {...}}
//! ```
//!
//! ## Response
//! - 200 `{"message": "successfully sent log entry via Telegram"}`
//! - 400 `{"error": "invalid JSON request body"}`, or an entry with no
//!   non-empty field
//! - 401 empty body (missing or unknown `X-ID`)
//! - 500 `{"error": ...}`, never carrying internal detail

mod log_entry;
mod response;

pub use log_entry::{level_emoji, LogEntry};
pub use response::{Response, ResponseBody, Status};

/// Header carrying the caller's user ID
pub const ID_HEADER: &str = "X-ID";

/// Maximum accepted request body
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

pub const MSG_SENT: &str = "successfully sent log entry via Telegram";
pub const MSG_INVALID_JSON: &str = "invalid JSON request body";
pub const MSG_EMPTY_ENTRY: &str = "log entry has no fields to send";
pub const MSG_DELIVERY_FAILED: &str = "failed to deliver log entry";
pub const MSG_INTERNAL: &str = "internal server error";
