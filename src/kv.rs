//! KV Store Module
//!
//! The handle the rest of the service talks to. Wraps an [`Engine`] with
//! open/close lifecycle, an in-flight operation gate and the error contract
//! repositories rely on (`NotFound`, `EngineClosed`, `StorageUnavailable`).
//!
//! ## Close policy
//! Operations already running when [`KvStore::close`] is called finish
//! normally and `close` waits for them. Any operation that *starts* after
//! `close` was invoked fails with `EngineClosed`.

use std::path::Path;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::engine::{Engine, EngineOptions, KvPair};
use crate::error::{RelayError, Result};

/// Byte-level store operations used by repositories.
///
/// Every call is its own transaction; results are materialized, never live
/// cursors.
pub trait KeyValueStore: Send + Sync {
    /// Point lookup. `NotFound` if absent.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// All live entries under `prefix`, ascending key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>>;

    /// Entries under `prefix` accepted by `predicate`, ascending key order,
    /// stopping after `limit` matches (`None` = unbounded)
    fn scan_prefix_filter(
        &self,
        prefix: &[u8],
        predicate: &mut dyn FnMut(&[u8], &[u8]) -> bool,
        limit: Option<usize>,
    ) -> Result<Vec<KvPair>>;

    /// Atomic upsert
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a key. `NotFound` if absent.
    fn delete(&self, key: &[u8]) -> Result<()>;
}

#[derive(Default)]
struct GateState {
    closed: bool,
    in_flight: usize,
}

/// Counts running operations and refuses new ones once closed
#[derive(Default)]
struct InFlightGate {
    state: Mutex<GateState>,
    drained: Condvar,
}

struct InFlightGuard<'a> {
    gate: &'a InFlightGate,
}

impl InFlightGate {
    fn enter(&self) -> Result<InFlightGuard<'_>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RelayError::EngineClosed);
        }
        state.in_flight += 1;
        Ok(InFlightGuard { gate: self })
    }

    /// Refuse new work and wait for running work to finish.
    /// Returns false if the gate was already closed.
    fn close_and_drain(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        while state.in_flight > 0 {
            self.drained.wait(&mut state);
        }
        true
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.gate.drained.notify_all();
        }
    }
}

/// Shared handle to the embedded database
pub struct KvStore {
    engine: RwLock<Option<Engine>>,
    gate: InFlightGate,
}

impl KvStore {
    /// Open or create the database in `path` with default engine options
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(EngineOptions::new(path))
    }

    /// Open with explicit engine options.
    ///
    /// Any failure (permissions, unreadable or incompatible files) is
    /// reported as `StorageUnavailable`.
    pub fn open_with(options: EngineOptions) -> Result<Self> {
        let dir = options.data_dir.clone();
        let engine = Engine::open(options).map_err(|e| {
            RelayError::StorageUnavailable(format!("cannot open {}: {}", dir.display(), e))
        })?;

        tracing::info!(
            dir = %dir.display(),
            sstables = engine.sstable_count(),
            "database opened"
        );

        Ok(Self {
            engine: RwLock::new(Some(engine)),
            gate: InFlightGate::default(),
        })
    }

    /// Stop accepting operations, wait for in-flight ones, then flush and
    /// release the engine. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        if !self.gate.close_and_drain() {
            tracing::debug!("database already closed");
            return Ok(());
        }

        let engine = self.engine.write().take();
        match engine {
            Some(engine) => {
                engine.close().map_err(RelayError::into_storage)?;
                tracing::info!("database closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// True once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Operations currently running
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// Run `op` against the engine inside the in-flight gate
    fn with_engine<T>(&self, op: impl FnOnce(&Engine) -> Result<T>) -> Result<T> {
        let _guard = self.gate.enter()?;
        let engine = self.engine.read();
        let engine = engine.as_ref().ok_or(RelayError::EngineClosed)?;
        op(engine).map_err(RelayError::into_storage)
    }

    /// Force a memtable flush
    pub fn flush(&self) -> Result<()> {
        self.with_engine(|engine| engine.flush())
    }

    /// Merge all SSTables into one
    pub fn compact(&self) -> Result<()> {
        self.with_engine(|engine| engine.compact())
    }
}

impl KeyValueStore for KvStore {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.with_engine(|engine| engine.get(key)?.ok_or(RelayError::NotFound))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        self.with_engine(|engine| engine.scan_prefix(prefix))
    }

    fn scan_prefix_filter(
        &self,
        prefix: &[u8],
        predicate: &mut dyn FnMut(&[u8], &[u8]) -> bool,
        limit: Option<usize>,
    ) -> Result<Vec<KvPair>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        self.with_engine(|engine| engine.scan_prefix_filter(prefix, predicate, limit))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_engine(|engine| engine.put(key, value))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_engine(|engine| {
            if engine.delete(key)? {
                Ok(())
            } else {
                Err(RelayError::NotFound)
            }
        })
    }
}

impl Drop for KvStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "failed to close database on drop");
        }
    }
}
