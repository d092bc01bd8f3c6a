//! Bot Module
//!
//! The messaging side of the relay: Bot API transport, update polling and
//! the command handlers that register and unregister users.
//!
//! ## Architecture
//! - Poller thread long-polls `getUpdates` and feeds a channel
//! - Message loop selects on that channel and the context's done signal
//! - Commands routed through the user repository

mod client;
mod commands;
mod poller;
mod types;

pub use client::{split_message, TelegramClient, MAX_MESSAGE_CHARS};
pub use commands::{parse_command, Command, CommandHandler};
pub use poller::{spawn_poller, RETRY_DELAY};
pub use types::{BotIdentity, Chat, Message, Sender, Update};

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;

use crate::context::Context;
use crate::error::{RelayError, Result};

/// What the relay needs from a messaging bot
pub trait BotTransport: Send + Sync {
    /// Verify the credentials and describe the bot account
    fn identify(&self) -> Result<BotIdentity>;

    /// Updates with ID >= `offset`, waiting up to `timeout` for one to arrive.
    ///
    /// `ListenerFailure` means polling can never succeed (rejected token).
    fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>>;

    /// Send `text` to a chat
    fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Runs the bot until the context is cancelled or polling fails for good
pub struct BotListener {
    transport: Arc<dyn BotTransport>,
    handler: CommandHandler,
    poll_timeout: Duration,
    retry_delay: Duration,
}

impl BotListener {
    pub fn new(
        transport: Arc<dyn BotTransport>,
        handler: CommandHandler,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            handler,
            poll_timeout,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Override the pause between failed polls
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Block until `ctx` is cancelled (returns its `Cancelled` error) or
    /// the update stream fails.
    pub fn run(&self, ctx: &Context) -> Result<()> {
        // The poller is left to notice cancellation on its own after its
        // current long poll; waiting for it would stretch shutdown.
        let (updates, _poller) = spawn_poller(
            ctx.clone(),
            Arc::clone(&self.transport),
            self.poll_timeout,
            self.retry_delay,
        )?;

        self.message_loop(ctx, &updates)
    }

    fn message_loop(&self, ctx: &Context, updates: &Receiver<Result<Update>>) -> Result<()> {
        loop {
            crossbeam::select! {
                recv(ctx.done()) -> _ => {
                    return Err(cancellation(ctx));
                }
                recv(updates) -> msg => match msg {
                    Ok(Ok(update)) => {
                        if let Err(e) = self.handler.handle_update(&update) {
                            tracing::warn!(update_id = update.update_id, error = %e, "command failed");
                        }
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        if ctx.is_cancelled() {
                            return Err(cancellation(ctx));
                        }
                        return Err(RelayError::ListenerFailure(
                            "update stream closed unexpectedly".to_string(),
                        ));
                    }
                },
            }
        }
    }
}

fn cancellation(ctx: &Context) -> RelayError {
    ctx.err()
        .unwrap_or_else(|| RelayError::Cancelled("context cancelled".to_string()))
}
