//! Discord Gateway v10 wire types.
//!
//! Only the slice of the protocol the relay speaks: the payload
//! envelope, Hello/Identify, and the `MESSAGE_CREATE` dispatch that
//! carries operator commands. The bot never resumes sessions; on any
//! disconnect it reconnects with a fresh Identify.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opcode 0: Dispatch, an event from the server.
pub const OP_DISPATCH: u8 = 0;

/// Opcode 1: Heartbeat.
pub const OP_HEARTBEAT: u8 = 1;

/// Opcode 2: Identify, starts a session.
pub const OP_IDENTIFY: u8 = 2;

/// Opcode 7: Reconnect, server asks us to drop and reconnect.
pub const OP_RECONNECT: u8 = 7;

/// Opcode 9: Invalid Session.
pub const OP_INVALID_SESSION: u8 = 9;

/// Opcode 10: Hello, first payload after connecting.
pub const OP_HELLO: u8 = 10;

/// Opcode 11: Heartbeat ACK.
pub const OP_HEARTBEAT_ACK: u8 = 11;

/// The envelope every Gateway payload travels in, both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Opcode.
    pub op: u8,

    /// Event data; `null` for heartbeats and ACKs.
    pub d: Option<Value>,

    /// Sequence number, present only on Dispatch payloads.
    pub s: Option<u64>,

    /// Event name, present only on Dispatch payloads.
    pub t: Option<String>,
}

/// The `d` field of Hello.
#[derive(Debug, Clone, Deserialize)]
pub struct HelloData {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

/// The `d` field of Identify.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    /// Bot token.
    pub token: String,

    /// Gateway intents bitmask.
    pub intents: u32,

    /// Connection properties.
    pub properties: ConnectionProperties,
}

/// Connection properties inside Identify.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl ConnectionProperties {
    pub fn this_library() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "inrelay".to_string(),
            device: "inrelay".to_string(),
        }
    }
}

/// A `MESSAGE_CREATE` dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    /// Message snowflake.
    pub id: String,

    /// Channel the message was sent in.
    pub channel_id: String,

    /// Message text.
    pub content: String,

    /// Sender.
    pub author: User,

    /// Guild id, absent in DMs.
    pub guild_id: Option<String>,
}

/// A Discord user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// User snowflake.
    pub id: String,

    /// Display name.
    pub username: String,

    /// Set for bot accounts.
    #[serde(default)]
    pub bot: bool,
}

/// The `d` field of a READY dispatch. Logged, not acted on.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyEvent {
    /// Gateway version.
    pub v: u32,

    /// The bot's own user object.
    pub user: User,
}
