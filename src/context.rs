//! Cancellable Context
//!
//! A tree of cancellation scopes shared between threads. Cancelling a
//! context cancels every context derived from it, never its parent.
//!
//! [`Context::done`] is a channel that never carries a value: it becomes
//! disconnected on cancel, so waiting threads wake up through an ordinary
//! `recv` or a `crossbeam::select!` arm.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::RelayError;

struct State {
    /// Dropped on cancel, which disconnects `done_rx`
    done_tx: Option<Sender<()>>,
    cause: Option<String>,
    children: Vec<Weak<Inner>>,
}

struct Inner {
    state: Mutex<State>,
    done_rx: Receiver<()>,
}

/// Cheap to clone; clones share the same cancellation state
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A root context, cancelled only explicitly
    pub fn new() -> Self {
        let (done_tx, done_rx) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    done_tx: Some(done_tx),
                    cause: None,
                    children: Vec::new(),
                }),
                done_rx,
            }),
        }
    }

    /// A context cancelled together with `self`
    pub fn child(&self) -> Context {
        let child = Context::new();

        let parent_cause = {
            let mut state = self.inner.state.lock();
            if state.cause.is_none() {
                state.children.retain(|c| c.strong_count() > 0);
                state.children.push(Arc::downgrade(&child.inner));
            }
            state.cause.clone()
        };

        if let Some(cause) = parent_cause {
            child.cancel(cause);
        }
        child
    }

    /// Cancel this context and its descendants. Only the first cause sticks.
    pub fn cancel(&self, cause: impl Into<String>) {
        Self::cancel_inner(&self.inner, cause.into());
    }

    fn cancel_inner(inner: &Arc<Inner>, cause: String) {
        let children = {
            let mut state = inner.state.lock();
            if state.cause.is_some() {
                return;
            }
            state.cause = Some(cause.clone());
            state.done_tx.take();
            std::mem::take(&mut state.children)
        };

        for child in children.iter().filter_map(Weak::upgrade) {
            Self::cancel_inner(&child, cause.clone());
        }
    }

    /// Disconnects when the context is cancelled
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cause.is_some()
    }

    /// `Cancelled(cause)` once cancelled
    pub fn err(&self) -> Option<RelayError> {
        self.inner
            .state
            .lock()
            .cause
            .clone()
            .map(RelayError::Cancelled)
    }

    /// Sleep for `timeout` unless cancelled first. True if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            _ => true,
        }
    }
}
