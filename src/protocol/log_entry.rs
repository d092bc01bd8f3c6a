//! Log entry definitions
//!
//! The JSON body accepted by the relay endpoint and its chat rendering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structured log event posted by a client. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub caller: String,
    pub time: String,
    pub level: String,
    pub message: String,
    pub error: String,

    #[serde(rename = "requestID")]
    pub request_id: String,

    #[serde(rename = "traceID")]
    pub trace_id: String,

    #[serde(rename = "spanID")]
    pub span_id: String,

    pub data: Option<Map<String, Value>>,
}

/// Emoji shown in front of a level name, matched case-insensitively
pub fn level_emoji(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" | "dbg" | "debugging" => Some("🐛"),
        "info" | "inf" | "information" => Some("💬"),
        "warn" | "wrn" | "warning" => Some("⚠️"),
        "error" | "err" => Some("❌"),
        "fatal" | "critical" => Some("💣"),
        _ => None,
    }
}

impl LogEntry {
    /// Render as chat text: one `Name: value` line per non-empty field
    pub fn to_message(&self) -> String {
        let mut out = String::new();
        let mut line = |name: &str, value: &str| {
            if !value.is_empty() {
                out.push_str(name);
                out.push_str(": ");
                out.push_str(value);
                out.push('\n');
            }
        };

        line("Caller", &self.caller);
        line("Time", &self.time);
        match level_emoji(&self.level) {
            Some(emoji) => line("Level", &format!("{} {}", emoji, self.level)),
            _ => line("Level", &self.level),
        }
        line("RequestID", &self.request_id);
        line("TraceID", &self.trace_id);
        line("SpanID", &self.span_id);
        line("Message", &self.message);
        line("Error", &self.error);

        if let Some(data) = self.data.as_ref().filter(|d| !d.is_empty()) {
            // A map of JSON values always serializes
            let rendered = serde_json::to_string(data).unwrap_or_default();
            line("Data", &rendered);
        }

        out
    }
}
