//! Interactive command handling.
//!
//! The Discord gateway turns slash-prefixed messages into
//! [`CommandEvent`]s; this handler consumes them. Two commands are
//! recognized: `ping` (liveness check) and `die` (controlled exit, the
//! supervisor restarts the process). Anything else is ignored.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use inrelay_types::message::CommandEvent;

use crate::traits::Notifier;

/// Reply to `ping`.
pub const PING_REPLY: &str = "Hello I'm ponging!";

/// Farewell posted before the `die` exit.
pub const DIE_REPLY: &str = "You kill me, but I will rise as a phoenix! \u{1F525}\u{1F985}\u{2728}";

/// Why the handler asked the process to terminate.
///
/// The exit is a supervision contract: the process does not
/// re-initialize itself in place, it exits with a code the supervisor
/// reads as "please restart me".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIntent {
    /// `die` was issued: exit cleanly so the supervisor restarts us.
    Restart,
}

/// Consumes command events and replies on the chat channel.
pub struct CommandHandler {
    notifier: Arc<dyn Notifier>,
}

impl CommandHandler {
    /// Create a handler that replies through the given notifier.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Process events until the stream ends, cancellation fires, or a
    /// command requests termination.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<CommandEvent>,
        cancel: CancellationToken,
    ) -> Option<ExitIntent> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("command handler shutting down");
                    return None;
                }
                event = events.recv() => {
                    match event {
                        None => {
                            debug!("command stream closed");
                            return None;
                        }
                        Some(event) => {
                            if let Some(intent) = self.handle(&event).await {
                                return Some(intent);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Handle one command. Returns an intent when the process should
    /// terminate.
    pub async fn handle(&self, event: &CommandEvent) -> Option<ExitIntent> {
        match event.command.as_str() {
            "ping" => {
                info!(sender = %event.sender, "ping command received");
                self.reply(event, PING_REPLY).await;
                None
            }
            "die" => {
                info!(sender = %event.sender, "die command received, requesting restart");
                // Reply failure must not block the exit: the restart
                // request stands even if the farewell never posts.
                self.reply(event, DIE_REPLY).await;
                Some(ExitIntent::Restart)
            }
            other => {
                debug!(command = %other, "ignoring unrecognized command");
                None
            }
        }
    }

    async fn reply(&self, event: &CommandEvent, text: &str) {
        if let Err(e) = self.notifier.post_text(&event.channel_id, text).await {
            warn!(error = %e, channel_id = %event.channel_id, "failed to post command reply");
        }
    }
}
