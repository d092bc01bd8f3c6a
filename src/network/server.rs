//! HTTP Server
//!
//! Serves the relay router on a dedicated thread that owns its own async
//! runtime. [`HttpServer::run`] blocks that thread; [`HttpServer::shutdown`]
//! may be called from any other.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::Router;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use tokio::sync::watch;

use crate::error::{RelayError, Result};

/// Extra wait on top of the graceful period before giving up on the
/// serving thread
const SHUTDOWN_SLACK: Duration = Duration::from_secs(2);

/// HTTP listener for the relay endpoint
pub struct HttpServer {
    listen_address: String,
    shutdown_timeout: Duration,

    /// Taken by `run`
    router: Mutex<Option<Router>>,

    shutdown_tx: watch::Sender<bool>,

    /// Held by `run` while serving; its drop disconnects `stopped_rx`
    stopped_tx: Mutex<Option<Sender<()>>>,
    stopped_rx: Receiver<()>,

    bound: Mutex<Option<SocketAddr>>,
    bound_cv: Condvar,
}

impl HttpServer {
    pub fn new(listen_address: impl Into<String>, shutdown_timeout: Duration, router: Router) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (stopped_tx, stopped_rx) = channel::bounded(0);

        Self {
            listen_address: listen_address.into(),
            shutdown_timeout,
            router: Mutex::new(Some(router)),
            shutdown_tx,
            stopped_tx: Mutex::new(Some(stopped_tx)),
            stopped_rx,
            bound: Mutex::new(None),
            bound_cv: Condvar::new(),
        }
    }

    /// Bind and serve until [`shutdown`](Self::shutdown).
    ///
    /// A bind failure is `ListenerFailure`. Returns `Ok` right away if
    /// shutdown was requested before the server started.
    pub fn run(&self) -> Result<()> {
        let Some(_running) = self.stopped_tx.lock().take() else {
            return Ok(());
        };
        let router = self
            .router
            .lock()
            .take()
            .ok_or_else(|| RelayError::InvalidState("HTTP server already ran".to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("http-worker")
            .build()
            .map_err(|e| RelayError::ListenerFailure(format!("cannot start runtime: {}", e)))?;

        let result = runtime.block_on(self.serve(router));

        // Requests still stuck past the deadline are abandoned here
        runtime.shutdown_timeout(SHUTDOWN_SLACK);
        tracing::info!("HTTP server stopped");
        result
    }

    async fn serve(&self, router: Router) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.listen_address)
            .await
            .map_err(|e| {
                RelayError::ListenerFailure(format!("cannot bind {}: {}", self.listen_address, e))
            })?;

        let addr = listener.local_addr()?;
        {
            *self.bound.lock() = Some(addr);
            self.bound_cv.notify_all();
        }
        tracing::info!(addr = %addr, "HTTP server listening");

        let mut graceful_rx = self.shutdown_tx.subscribe();
        let mut deadline_rx = self.shutdown_tx.subscribe();

        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = graceful_rx.wait_for(|stop| *stop).await;
            })
            .into_future();

        let deadline = async {
            let _ = deadline_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(self.shutdown_timeout).await;
        };

        tokio::select! {
            result = serve => {
                result.map_err(|e| RelayError::ListenerFailure(e.to_string()))
            }
            _ = deadline => {
                tracing::warn!(
                    timeout = ?self.shutdown_timeout,
                    "graceful shutdown timed out, dropping open connections"
                );
                Ok(())
            }
        }
    }

    /// Stop accepting connections and wait for in-flight requests to
    /// finish, at most the configured shutdown timeout.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);

        // Never started: nothing to wait for
        if self.stopped_tx.lock().take().is_some() {
            return;
        }

        match self
            .stopped_rx
            .recv_timeout(self.shutdown_timeout + SHUTDOWN_SLACK)
        {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("HTTP server did not stop in time");
            }
            _ => tracing::debug!("HTTP server shutdown complete"),
        }
    }

    /// True once shutdown was requested
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Address actually bound, once the listener is up
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock()
    }

    /// Wait for the listener to bind, up to `timeout`
    pub fn wait_until_bound(&self, timeout: Duration) -> Option<SocketAddr> {
        let deadline = Instant::now() + timeout;
        let mut bound = self.bound.lock();
        while bound.is_none() {
            if self.bound_cv.wait_until(&mut bound, deadline).timed_out() {
                break;
            }
        }
        *bound
    }
}
