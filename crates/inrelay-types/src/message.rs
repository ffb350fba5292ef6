//! Data model for the relay pipeline.
//!
//! A [`MailMessage`] is what the mail adapter hands the poll loop, a
//! [`ParsedMessage`] is what the content parser extracts from it, and a
//! [`Notification`] is the assembled payload dispatched to the chat
//! channel. [`CommandEvent`] flows the other way: interactive commands
//! arriving from the chat gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mail message fetched from the inbox, already decoded to plain text.
///
/// Immutable once fetched; owned by the poll loop for a single cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMessage {
    /// Opaque provider-unique message identifier.
    pub id: String,

    /// Raw `From` header, possibly in `Name <addr>` form.
    pub sender: String,

    /// Subject line.
    pub subject: String,

    /// When the provider received the message.
    pub received_at: DateTime<Utc>,

    /// Decoded plain-text body.
    pub body: String,
}

impl MailMessage {
    /// The bare sender address, stripped of any display name.
    ///
    /// `"Darren <no.reply.inreach@garmin.com>"` yields
    /// `"no.reply.inreach@garmin.com"`.
    pub fn sender_address(&self) -> &str {
        let s = self.sender.trim();
        match (s.rfind('<'), s.rfind('>')) {
            (Some(start), Some(end)) if start < end => s[start + 1..end].trim(),
            _ => s,
        }
    }
}

/// Qualification criteria for relayed mail.
///
/// Loaded once at startup; the cutoff is the process start time, so only
/// mail arriving after boot is eligible.
#[derive(Debug, Clone)]
pub struct FilterCriteria {
    /// Allowed sender addresses (case-insensitive match).
    pub senders: Vec<String>,

    /// Exact subject line required.
    pub subject: String,

    /// Only mail received strictly after this instant qualifies.
    pub cutoff: DateTime<Utc>,
}

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Degrees north, in [-90, 90].
    pub latitude: f64,

    /// Degrees east, in [-180, 180].
    pub longitude: f64,
}

impl Coordinates {
    /// Construct a pair, rejecting out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
            Some(Self {
                latitude,
                longitude,
            })
        } else {
            None
        }
    }

    /// Google Maps link for this position.
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

/// Fields extracted from a qualifying mail body.
///
/// Every field degrades independently: a template change upstream can
/// cost us the link or the coordinates without losing the message text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    /// Human-written message content, boilerplate stripped.
    pub text: String,

    /// Garmin tracking/reply URL, if one was found.
    pub tracking_link: Option<String>,

    /// Position the message was sent from, if present and in range.
    pub coordinates: Option<Coordinates>,
}

/// The assembled chat notification.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Embed title.
    pub title: String,

    /// Message text (embed description).
    pub text: String,

    /// Optional tracking link field.
    pub link: Option<String>,

    /// Optional coordinate field.
    pub coordinates: Option<Coordinates>,
}

/// An interactive command received from the chat gateway.
#[derive(Debug, Clone)]
pub struct CommandEvent {
    /// Command name with the leading slash stripped (e.g. `"ping"`).
    pub command: String,

    /// Channel the command was issued in (replies go here).
    pub channel_id: String,

    /// Display name of the issuing user, for logging.
    pub sender: String,
}
