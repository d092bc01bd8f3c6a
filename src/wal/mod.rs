//! Write-Ahead Log
//!
//! Every put and delete on the user store lands here before the memtable
//! sees it. A single `wal.log` lives in the data directory; it is replayed
//! into an SSTable on open and truncated once that SSTable is on disk.
//!
//! ```text
//! [LSN u64][CRC u32][Len u32][payload: Len bytes] [LSN ...] ...
//!  \________ 16-byte header ________/
//! ```
//!
//! The payload is bincode (operation + timestamp); the CRC covers LSN and
//! payload. LSNs start at 1 and keep counting across reopen and truncate.
//!
//! A torn or corrupt entry ends replay: [`WalRecovery`] cuts the file back
//! to the last good entry so new appends follow valid data. Durability is
//! set by [`WalSyncStrategy`](crate::config::WalSyncStrategy).

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
