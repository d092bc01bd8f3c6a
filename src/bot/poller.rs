//! Update poller
//!
//! Long-polls `getUpdates` on its own thread and feeds the results into a
//! channel, so the message loop can wait on updates and cancellation at
//! the same time.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use super::types::Update;
use super::BotTransport;
use crate::context::Context;
use crate::error::{RelayError, Result};

/// Pause before retrying a failed poll
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Start polling. The thread exits once `ctx` is cancelled, the receiver
/// is dropped, or the transport fails fatally (the error is sent first).
///
/// A poll in progress is not interrupted, so the thread may outlive
/// cancellation by up to `timeout`.
pub fn spawn_poller(
    ctx: Context,
    transport: Arc<dyn BotTransport>,
    timeout: Duration,
    retry_delay: Duration,
) -> Result<(Receiver<Result<Update>>, JoinHandle<()>)> {
    let (tx, rx) = channel::bounded(64);

    let handle = thread::Builder::new()
        .name("bot-poller".to_string())
        .spawn(move || poll_loop(&ctx, transport.as_ref(), &tx, timeout, retry_delay))?;

    Ok((rx, handle))
}

fn poll_loop(
    ctx: &Context,
    transport: &dyn BotTransport,
    tx: &Sender<Result<Update>>,
    timeout: Duration,
    retry_delay: Duration,
) {
    let mut offset: i64 = 0;

    while !ctx.is_cancelled() {
        let updates = match transport.get_updates(offset, timeout) {
            Ok(updates) => updates,
            Err(e @ RelayError::ListenerFailure(_)) => {
                tracing::error!(error = %e, "update polling failed permanently");
                let _ = tx.send(Err(e));
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, retry_in = ?retry_delay, "update polling failed");
                if ctx.wait_timeout(retry_delay) {
                    break;
                }
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            if tx.send(Ok(update)).is_err() {
                return;
            }
        }
    }

    tracing::debug!("update poller stopped");
}
