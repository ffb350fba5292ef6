//! Discord Gateway listener.
//!
//! Maintains a Gateway v10 WebSocket session so operators can issue
//! slash-style commands (`/ping`, `/die`) in the relay channel. The
//! connection is receive-only from the relay's point of view apart
//! from heartbeats: recognized commands are forwarded as
//! [`CommandEvent`]s and answered over REST by the command handler.
//!
//! Sessions are never resumed. Any disconnect, server-requested or
//! not, is handled by waiting a fixed delay and identifying fresh;
//! the relay holds no per-session state worth replaying.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use inrelay_types::config::DiscordConfig;
use inrelay_types::message::CommandEvent;
use inrelay_types::secret::SecretString;

use super::events::{
    ConnectionProperties, GatewayPayload, HelloData, IdentifyPayload, MessageCreate, ReadyEvent,
    OP_DISPATCH, OP_HEARTBEAT, OP_HEARTBEAT_ACK, OP_HELLO, OP_IDENTIFY, OP_INVALID_SESSION,
    OP_RECONNECT,
};

/// Delay before reconnecting after a dropped connection.
const RECONNECT_DELAY_SECS: u64 = 5;

/// Heartbeat interval to fall back on if Hello never arrives.
const FALLBACK_HEARTBEAT_MS: u64 = 41_250;

/// Extract a command name from message content.
///
/// Commands are a leading `/` followed by a name; anything after the
/// first whitespace is ignored. Returns the lowercased name.
pub fn parse_command(content: &str) -> Option<String> {
    let trimmed = content.trim();
    let rest = trimmed.strip_prefix('/')?;
    let name = rest.split_whitespace().next()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_ascii_lowercase())
}

/// Gateway WebSocket client feeding operator commands to the handler.
pub struct DiscordGateway {
    config: DiscordConfig,
    token: SecretString,
    command_tx: UnboundedSender<CommandEvent>,
}

impl DiscordGateway {
    pub fn new(
        config: DiscordConfig,
        token: SecretString,
        command_tx: UnboundedSender<CommandEvent>,
    ) -> Self {
        Self {
            config,
            token,
            command_tx,
        }
    }

    /// Whether a sender id passes the allow list. An empty list allows
    /// everyone.
    fn is_allowed(&self, sender_id: &str) -> bool {
        self.config.allow_from.is_empty()
            || self.config.allow_from.iter().any(|id| id == sender_id)
    }

    /// Turn a `MESSAGE_CREATE` into a [`CommandEvent`] if it is a
    /// command from an allowed, non-bot author.
    fn handle_message_create(&self, msg: &MessageCreate) {
        if msg.author.bot {
            debug!(author = %msg.author.username, "ignoring bot message");
            return;
        }
        if !self.is_allowed(&msg.author.id) {
            warn!(
                sender_id = %msg.author.id,
                channel_id = %msg.channel_id,
                "ignoring message from disallowed user"
            );
            return;
        }
        let command = match parse_command(&msg.content) {
            Some(c) => c,
            None => return,
        };

        info!(command = %command, sender = %msg.author.username, "command received");
        let event = CommandEvent {
            command,
            channel_id: msg.channel_id.clone(),
            sender: msg.author.username.clone(),
        };
        // A closed receiver means the handler task is gone and the
        // process is already shutting down.
        if self.command_tx.send(event).is_err() {
            warn!("command handler is gone, dropping command");
        }
    }

    /// Run until cancelled, reconnecting on any connection loss.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Discord gateway starting");

        loop {
            let ws_stream =
                match tokio_tungstenite::connect_async(&self.config.gateway_url).await {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        error!(error = %e, "failed to connect Discord Gateway");
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = tokio::time::sleep(
                                Duration::from_secs(RECONNECT_DELAY_SECS)
                            ) => continue,
                        }
                    }
                };

            info!("Discord gateway connected");

            let (mut ws_write, mut ws_read) = ws_stream.split();

            // Wait for Hello (opcode 10) to learn the heartbeat cadence.
            let heartbeat_interval = loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = ws_write.close().await;
                        return;
                    }
                    msg = ws_read.next() => {
                        match msg {
                            Some(Ok(WsMessage::Text(text))) => {
                                if let Ok(payload) =
                                    serde_json::from_str::<GatewayPayload>(&text)
                                {
                                    if payload.op == OP_HELLO {
                                        if let Some(d) = payload.d {
                                            if let Ok(hello) =
                                                serde_json::from_value::<HelloData>(d)
                                            {
                                                break hello.heartbeat_interval;
                                            }
                                        }
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                error!(error = %e, "WebSocket error waiting for Hello");
                                break FALLBACK_HEARTBEAT_MS;
                            }
                            None => break FALLBACK_HEARTBEAT_MS,
                            _ => {}
                        }
                    }
                }
            };

            debug!(interval_ms = heartbeat_interval, "received Hello");

            let identify = GatewayPayload {
                op: OP_IDENTIFY,
                d: Some(
                    serde_json::to_value(IdentifyPayload {
                        token: self.token.expose().to_owned(),
                        intents: self.config.intents,
                        properties: ConnectionProperties::this_library(),
                    })
                    .unwrap_or_default(),
                ),
                s: None,
                t: None,
            };

            let mut identify_failed = false;
            if let Ok(json) = serde_json::to_string(&identify) {
                if let Err(e) = ws_write.send(WsMessage::Text(json)).await {
                    error!(error = %e, "failed to send Identify");
                    identify_failed = true;
                }
            }
            if identify_failed {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(
                        Duration::from_secs(RECONNECT_DELAY_SECS)
                    ) => continue,
                }
            }

            let mut heartbeat_timer =
                tokio::time::interval(Duration::from_millis(heartbeat_interval));
            // First tick fires immediately; skip it.
            heartbeat_timer.tick().await;

            let mut last_seq: Option<u64> = None;

            // Event loop for this connection. Breaking out reconnects.
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Discord gateway shutting down");
                        let _ = ws_write.close().await;
                        return;
                    }
                    _ = heartbeat_timer.tick() => {
                        let hb = GatewayPayload {
                            op: OP_HEARTBEAT,
                            d: last_seq.map(|s| serde_json::json!(s)),
                            s: None,
                            t: None,
                        };
                        if let Ok(json) = serde_json::to_string(&hb) {
                            if let Err(e) = ws_write.send(WsMessage::Text(json)).await {
                                warn!(error = %e, "failed to send heartbeat");
                                break;
                            }
                            debug!(seq = ?last_seq, "sent heartbeat");
                        }
                    }
                    msg = ws_read.next() => {
                        match msg {
                            Some(Ok(WsMessage::Text(text))) => {
                                let payload =
                                    match serde_json::from_str::<GatewayPayload>(&text) {
                                        Ok(p) => p,
                                        Err(e) => {
                                            warn!(error = %e, "unparseable Gateway payload");
                                            continue;
                                        }
                                    };
                                if let Some(s) = payload.s {
                                    last_seq = Some(s);
                                }
                                match payload.op {
                                    OP_DISPATCH => {
                                        self.handle_dispatch(&payload);
                                    }
                                    OP_HEARTBEAT => {
                                        // Server asked for an immediate beat.
                                        let hb = GatewayPayload {
                                            op: OP_HEARTBEAT,
                                            d: last_seq.map(|s| serde_json::json!(s)),
                                            s: None,
                                            t: None,
                                        };
                                        if let Ok(json) = serde_json::to_string(&hb) {
                                            if ws_write
                                                .send(WsMessage::Text(json))
                                                .await
                                                .is_err()
                                            {
                                                break;
                                            }
                                        }
                                    }
                                    OP_HEARTBEAT_ACK => {
                                        debug!("heartbeat acknowledged");
                                    }
                                    OP_RECONNECT | OP_INVALID_SESSION => {
                                        info!(op = payload.op, "server requested reconnect");
                                        let _ = ws_write.close().await;
                                        break;
                                    }
                                    other => {
                                        debug!(op = other, "ignoring Gateway opcode");
                                    }
                                }
                            }
                            Some(Ok(WsMessage::Close(frame))) => {
                                info!(frame = ?frame, "Gateway connection closed");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "WebSocket error");
                                break;
                            }
                            None => {
                                info!("Gateway stream ended");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)) => {}
            }
        }
    }

    fn handle_dispatch(&self, payload: &GatewayPayload) {
        let event_name = match payload.t.as_deref() {
            Some(t) => t,
            None => return,
        };
        match event_name {
            "READY" => {
                if let Some(d) = &payload.d {
                    if let Ok(ready) = serde_json::from_value::<ReadyEvent>(d.clone()) {
                        info!(
                            bot_id = %ready.user.id,
                            bot_name = %ready.user.username,
                            "Discord bot authenticated"
                        );
                    }
                }
            }
            "MESSAGE_CREATE" => {
                if let Some(d) = &payload.d {
                    match serde_json::from_value::<MessageCreate>(d.clone()) {
                        Ok(msg) => self.handle_message_create(&msg),
                        Err(e) => warn!(error = %e, "malformed MESSAGE_CREATE"),
                    }
                }
            }
            other => {
                debug!(event = other, "ignoring dispatch event");
            }
        }
    }
}
