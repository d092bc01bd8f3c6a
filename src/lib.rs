//! # logrelay
//!
//! Relays structured log events to Telegram chats:
//! - HTTP endpoint receiving JSON log entries, authenticated by user ID
//! - Telegram bot for self-registration (`/start`, `/stop`)
//! - Embedded LSM key-value store with WAL and crash recovery
//! - Coordinated startup and shutdown of both listeners
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐          ┌──────────────────────┐
//! │   HTTP listener      │          │   Bot message loop   │
//! │   (POST /, X-ID)     │          │   (long polling)     │
//! └──────────┬───────────┘          └──────────┬───────────┘
//!            │        ┌─────────────┐          │
//!            └───────►│ Repository  │◄─────────┘
//!                     │ (user-<id>) │
//!                     └──────┬──────┘
//!                            │
//!                     ┌──────▼──────┐
//!                     │   KvStore   │  open/close, in-flight gate
//!                     └──────┬──────┘
//!                            │
//!          ┌─────────────────┼─────────────────┐
//!          ▼                 ▼                 ▼
//!   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!   │     WAL     │   │  MemTable   │   │  SSTables   │
//!   └─────────────┘   └─────────────┘   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod context;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod kv;

pub mod model;
pub mod repository;

pub mod protocol;
pub mod network;
pub mod bot;
pub mod app;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use app::{App, AppState};
pub use config::Config;
pub use context::Context;
pub use engine::Engine;
pub use error::{RelayError, Result};
pub use kv::{KeyValueStore, KvStore};
pub use model::User;
pub use repository::{UserReader, UserRepository, UserWriter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of logrelay
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
