//! Lifecycle Orchestrator
//!
//! Owns the database and the two listeners (HTTP relay and bot message
//! loop) for one run of the service.
//!
//! ```text
//! Initializing ──run()──► Running ──trigger──► ShuttingDown ──► Stopped
//! ```
//!
//! The first of these triggers shutdown: the context is cancelled, or
//! either listener reports back (even successfully, since one listener
//! without the other is useless). Cleanup then runs in a fixed order:
//! cancel the context, drain the HTTP server, close the database, join
//! both listener threads.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvError, Sender};
use parking_lot::Mutex;

use crate::bot::{BotListener, BotTransport, CommandHandler, TelegramClient};
use crate::config::Config;
use crate::context::Context;
use crate::engine::EngineOptions;
use crate::error::{RelayError, Result};
use crate::kv::KvStore;
use crate::network::{router, HttpServer, RelayState};
use crate::repository::{UserRepository, UserStore};

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// Outcome reported by a listener thread, exactly once
type TaskResult = Result<()>;

/// Body of a listener thread
type Task = Box<dyn FnOnce() -> TaskResult + Send>;

/// Starts a listener thread; swapped out in tests
type Spawner = fn(&str, Sender<TaskResult>, Task) -> Result<JoinHandle<()>>;

pub struct App {
    ctx: Context,
    state: Mutex<AppState>,
    store: Arc<KvStore>,
    http: Arc<HttpServer>,
    bot: Arc<BotListener>,
}

impl App {
    /// Connect to the Bot API, open the database and prepare both
    /// listeners. Nothing is served until [`run`](Self::run).
    pub fn start(parent: &Context, config: Config) -> Result<Self> {
        let transport = Arc::new(TelegramClient::new(&config.telegram_bot)?);
        Self::start_with_transport(parent, config, transport)
    }

    /// [`start`](Self::start) with a caller-supplied bot transport
    pub fn start_with_transport(
        parent: &Context,
        config: Config,
        transport: Arc<dyn BotTransport>,
    ) -> Result<Self> {
        let ctx = parent.child();

        tracing::info!("setting up the bot connection");
        let identity = transport.identify()?;
        tracing::info!(
            bot_id = identity.id,
            username = identity.username.as_deref().unwrap_or("?"),
            "authorized on bot account"
        );

        tracing::info!(dir = %config.storage.data_dir.display(), "opening the database");
        let store = Arc::new(KvStore::open_with(EngineOptions::from(&config.storage))?);
        let users: Arc<dyn UserStore> = Arc::new(UserRepository::new(Arc::clone(&store)));

        tracing::info!(addr = %config.listen_address, "setting up the HTTP server");
        let http = HttpServer::new(
            config.listen_address.clone(),
            config.shutdown_timeout(),
            router(RelayState {
                users: Arc::clone(&users),
                transport: Arc::clone(&transport),
            }),
        );

        let handler = CommandHandler::new(
            users,
            Arc::clone(&transport),
            config.telegram_bot.superuser_chat_id,
        );
        let bot = BotListener::new(
            transport,
            handler,
            Duration::from_secs(config.telegram_bot.poll_timeout_secs),
        );

        Ok(Self {
            ctx,
            state: Mutex::new(AppState::Initializing),
            store,
            http: Arc::new(http),
            bot: Arc::new(bot),
        })
    }

    /// Serve until shutdown is triggered, then clean up.
    ///
    /// Returns the cancellation cause if the context ended the run, the
    /// error of the listener that ended it otherwise, or `Ok` if that
    /// listener finished cleanly.
    pub fn run(&self) -> Result<()> {
        let http = Arc::clone(&self.http);
        let http_task: Task = Box::new(move || {
            tracing::info!("starting the HTTP server");
            http.run()
        });

        let bot = Arc::clone(&self.bot);
        let ctx = self.ctx.clone();
        let bot_task: Task = Box::new(move || {
            tracing::info!("starting the bot message loop");
            let result = bot.run(&ctx);
            tracing::info!("bot message loop stopped");
            result
        });

        self.run_listeners(http_task, bot_task, spawn_task)
    }

    /// Lifecycle around two listener bodies: spawn, wait for the first
    /// trigger, clean up, join.
    fn run_listeners(&self, http_task: Task, bot_task: Task, spawn: Spawner) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != AppState::Initializing {
                return Err(RelayError::InvalidState(format!(
                    "run called in state {:?}",
                    *state
                )));
            }
            *state = AppState::Running;
        }

        let (http_rx, bot_rx, handles) = match self.spawn_listeners(http_task, bot_task, spawn) {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::error!(error = %e, "could not start listeners");
                self.shut_down("listener start failed");
                *self.state.lock() = AppState::Stopped;
                return Err(e);
            }
        };

        let result = crossbeam::select! {
            recv(self.ctx.done()) -> _ => {
                tracing::info!("context is done");
                Err(self.cancellation())
            }
            recv(http_rx) -> msg => {
                let result = task_outcome(msg);
                log_outcome("HTTP server", &result);
                result
            }
            recv(bot_rx) -> msg => {
                let result = task_outcome(msg);
                log_outcome("bot message loop", &result);
                result
            }
        };

        self.shut_down("shutting down");

        tracing::debug!("waiting for listener threads");
        for handle in handles {
            join_listener(handle);
        }

        *self.state.lock() = AppState::Stopped;
        tracing::info!("app stopped");
        result
    }

    fn spawn_listeners(
        &self,
        http_task: Task,
        bot_task: Task,
        spawn: Spawner,
    ) -> Result<(Receiver<TaskResult>, Receiver<TaskResult>, Vec<JoinHandle<()>>)> {
        let (http_tx, http_rx) = channel::bounded(1);
        let http_handle = spawn("http-listener", http_tx, http_task)?;

        let (bot_tx, bot_rx) = channel::bounded(1);
        let bot_handle = match spawn("bot-listener", bot_tx, bot_task) {
            Ok(handle) => handle,
            Err(e) => {
                // Stop and reap the listener that did start
                self.http.shutdown();
                join_listener(http_handle);
                return Err(e);
            }
        };

        Ok((http_rx, bot_rx, vec![http_handle, bot_handle]))
    }

    /// Cancel, drain the HTTP server, close the database
    fn shut_down(&self, cause: &str) {
        *self.state.lock() = AppState::ShuttingDown;
        self.ctx.cancel(cause);

        tracing::info!("cleanup started");

        tracing::info!("gracefully shutting down the HTTP server");
        self.http.shutdown();

        tracing::info!("closing the database");
        if let Err(e) = self.store.close() {
            tracing::error!(error = %e, "error when closing the database");
        }

        tracing::info!("cleanup complete");
    }

    fn cancellation(&self) -> RelayError {
        self.ctx
            .err()
            .unwrap_or_else(|| RelayError::Cancelled("context cancelled".to_string()))
    }

    /// Request shutdown from any thread
    pub fn stop(&self) {
        tracing::info!("cancelling app context");
        self.ctx.cancel("stop requested");
    }

    pub fn state(&self) -> AppState {
        *self.state.lock()
    }

    /// The run's own context, a child of the one passed to `start`
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Shared database handle
    pub fn store(&self) -> Arc<KvStore> {
        Arc::clone(&self.store)
    }

    /// Address the HTTP server bound, waiting up to `timeout` for it
    pub fn http_addr(&self, timeout: Duration) -> Option<SocketAddr> {
        self.http.wait_until_bound(timeout)
    }
}

/// Run `task` on a named thread and report its outcome on `tx`. A panic
/// is reported as `ListenerFailure`. The sender is dropped on return.
fn spawn_task(name: &str, tx: Sender<TaskResult>, task: Task) -> Result<JoinHandle<()>> {
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
                Err(RelayError::ListenerFailure(format!(
                    "{} panicked: {}",
                    thread_name,
                    panic_message(payload.as_ref())
                )))
            });
            let _ = tx.send(result);
        })
        .map_err(|e| RelayError::ListenerFailure(format!("cannot spawn {}: {}", name, e)))
}

fn join_listener(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("listener").to_string();
    if handle.join().is_err() {
        tracing::error!(thread = %name, "listener thread panicked");
    }
}

/// Cancellation is the normal way a listener ends, so it is not an error
fn log_outcome(listener: &str, result: &TaskResult) {
    match result {
        Ok(()) => tracing::info!("{} finished", listener),
        Err(e) if e.is_cancelled() => tracing::info!(reason = %e, "{} stopped", listener),
        Err(e) => tracing::error!(error = %e, "{} encountered an error", listener),
    }
}

fn task_outcome(msg: std::result::Result<TaskResult, RecvError>) -> TaskResult {
    msg.unwrap_or_else(|_| {
        Err(RelayError::ListenerFailure(
            "listener exited without reporting".to_string(),
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
