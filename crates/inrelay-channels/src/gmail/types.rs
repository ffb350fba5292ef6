//! Gmail REST v1 wire types.
//!
//! Only the subset the relay touches: message listing and full message
//! payloads with enough MIME structure to dig out the plain-text part.

use base64::Engine;
use serde::Deserialize;

/// Response to `GET /users/me/messages?q=...`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    /// Matching message references. Absent when nothing matched.
    #[serde(default)]
    pub messages: Vec<MessageRef>,

    /// Approximate total result count.
    #[serde(default, rename = "resultSizeEstimate")]
    pub result_size_estimate: u32,
}

/// A message id/thread pair from a list response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    /// Message identifier, unique within the mailbox.
    pub id: String,
}

/// Response to `GET /users/me/messages/{id}?format=full`.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: String,

    /// Provider receive time, milliseconds since the Unix epoch,
    /// serialized as a decimal string.
    #[serde(default, rename = "internalDate")]
    pub internal_date: Option<String>,

    /// MIME tree root.
    pub payload: MessagePart,
}

impl Message {
    /// Receive time in epoch milliseconds, when present and numeric.
    pub fn internal_date_ms(&self) -> Option<i64> {
        self.internal_date.as_deref().and_then(|s| s.parse().ok())
    }

    /// Header value by case-insensitive name, empty string if absent.
    pub fn header(&self, name: &str) -> &str {
        self.payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .unwrap_or("")
    }
}

/// One node of the MIME tree.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePart {
    /// MIME type, e.g. `text/plain`.
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,

    /// Headers on this part (the root part carries From/Subject/Date).
    #[serde(default)]
    pub headers: Vec<Header>,

    /// Body data for leaf parts.
    #[serde(default)]
    pub body: PartBody,

    /// Child parts for multipart messages.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// A single message header.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,

    /// Header value.
    pub value: String,
}

/// Base64url-encoded body content of a MIME part.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    /// URL-safe base64 body data. Absent for container parts.
    #[serde(default)]
    pub data: Option<String>,
}

/// Decode the first `text/plain` body found in the MIME tree.
///
/// Walks children depth-first; falls back to the root body for
/// single-part messages. Undecodable data yields `None` rather than
/// an error -- the caller logs and moves on.
pub fn extract_plain_text(payload: &MessagePart) -> Option<String> {
    if payload.mime_type == "text/plain" {
        if let Some(text) = decode_body(&payload.body) {
            return Some(text);
        }
    }

    for part in &payload.parts {
        if let Some(text) = extract_plain_text(part) {
            return Some(text);
        }
    }

    // Single-part messages put the data directly on the root.
    if payload.parts.is_empty() {
        return decode_body(&payload.body);
    }

    None
}

fn decode_body(body: &PartBody) -> Option<String> {
    let data = body.data.as_deref()?;
    let bytes = base64::engine::general_purpose::URL_SAFE
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(data))
        .ok()?;
    String::from_utf8(bytes).ok()
}
