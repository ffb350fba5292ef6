//! Discord REST API client.
//!
//! Typed wrapper for the two REST calls the relay makes: posting an
//! embed for a relayed message, and posting plain text for command
//! replies. Rate-limited or failed sends surface as
//! [`DispatchError::SendFailed`]; the poll loop retries on its own
//! schedule rather than sleeping inside the client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use inrelay_core::traits::Notifier;
use inrelay_types::error::DispatchError;
use inrelay_types::message::Notification;
use inrelay_types::secret::SecretString;

/// Base URL for the Discord REST API v10.
const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Embed accent color (green).
const EMBED_COLOR: u32 = 0x00FF00;

/// Footer text on every relayed embed.
const EMBED_FOOTER: &str = "inReach Satellite Communicator";

/// Response from creating a message.
#[derive(Debug, Clone, serde::Deserialize)]
struct DiscordMessage {
    id: String,
}

/// HTTP client for the Discord REST API, authenticated as a bot.
pub struct DiscordApiClient {
    http: Client,
    token: SecretString,
    base_url: String,
}

impl DiscordApiClient {
    /// Build the client. Every request carries the given timeout so a
    /// stalled Discord endpoint cannot hang a poll cycle or a command
    /// reply.
    pub fn new(token: SecretString, request_timeout: Duration) -> Result<Self, DispatchError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DispatchError::SendFailed(format!("http client: {e}")))?;

        Ok(Self {
            http,
            token,
            base_url: DISCORD_API_BASE.to_owned(),
        })
    }

    /// Point the client at a different API root. Test hook.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post_payload(&self, channel_id: &str, body: &Value) -> Result<(), DispatchError> {
        let url = format!("{}/channels/{channel_id}/messages", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token.expose()))
            .json(body)
            .send()
            .await
            .map_err(|e| DispatchError::SendFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let err_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".into());
            return Err(DispatchError::SendFailed(format!(
                "Discord API returned {status}: {err_body}"
            )));
        }

        let msg: DiscordMessage = resp
            .json()
            .await
            .map_err(|e| DispatchError::SendFailed(e.to_string()))?;
        debug!(channel_id, message_id = %msg.id, "posted message");
        Ok(())
    }
}

/// Build the embed document for a relayed notification.
///
/// Optional fields are appended only when present, so a sparse parse
/// still produces a readable embed.
fn build_embed(notification: &Notification) -> Value {
    let mut fields = Vec::new();
    if let Some(link) = &notification.link {
        fields.push(json!({
            "name": "Tracking Link",
            "value": format!("[View Location or Reply]({link})"),
            "inline": false,
        }));
    }
    if let Some(coords) = &notification.coordinates {
        fields.push(json!({
            "name": "Location",
            "value": format!("Lat: {}, Lon: {}", coords.latitude, coords.longitude),
            "inline": true,
        }));
        fields.push(json!({
            "name": "Google Maps",
            "value": format!("[Open in Maps]({})", coords.maps_url()),
            "inline": true,
        }));
    }

    json!({
        "title": notification.title,
        "description": notification.text,
        "color": EMBED_COLOR,
        "fields": fields,
        "footer": {"text": EMBED_FOOTER},
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

#[async_trait]
impl Notifier for DiscordApiClient {
    async fn post_notification(
        &self,
        channel_id: &str,
        notification: &Notification,
    ) -> Result<(), DispatchError> {
        let body = json!({"embeds": [build_embed(notification)]});
        self.post_payload(channel_id, &body).await
    }

    async fn post_text(&self, channel_id: &str, text: &str) -> Result<(), DispatchError> {
        let body = json!({"content": text});
        self.post_payload(channel_id, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inrelay_types::message::Coordinates;

    fn notification() -> Notification {
        Notification {
            title: "inReach message from Darren".into(),
            text: "Made camp before the storm. All good.".into(),
            link: Some("https://explore.garmin.com/textmessage/txtmsg?extId=abc".into()),
            coordinates: Coordinates::new(47.6, -122.3),
        }
    }

    #[test]
    fn embed_carries_title_text_and_color() {
        let embed = build_embed(&notification());
        assert_eq!(embed["title"], "inReach message from Darren");
        assert_eq!(embed["description"], "Made camp before the storm. All good.");
        assert_eq!(embed["color"], 0x00FF00);
        assert_eq!(embed["footer"]["text"], "inReach Satellite Communicator");
    }

    #[test]
    fn embed_link_field_is_masked_markdown() {
        let embed = build_embed(&notification());
        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields[0]["name"], "Tracking Link");
        assert_eq!(
            fields[0]["value"],
            "[View Location or Reply](https://explore.garmin.com/textmessage/txtmsg?extId=abc)"
        );
    }

    #[test]
    fn embed_coordinate_fields_include_maps_link() {
        let embed = build_embed(&notification());
        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1]["name"], "Location");
        assert_eq!(fields[1]["value"], "Lat: 47.6, Lon: -122.3");
        assert_eq!(fields[2]["name"], "Google Maps");
        assert_eq!(
            fields[2]["value"],
            "[Open in Maps](https://www.google.com/maps?q=47.6,-122.3)"
        );
    }

    #[test]
    fn sparse_notification_omits_optional_fields() {
        let n = Notification {
            title: "inReach Message".into(),
            text: "No message content found".into(),
            link: None,
            coordinates: None,
        };
        let embed = build_embed(&n);
        assert!(embed["fields"].as_array().unwrap().is_empty());
        assert_eq!(embed["title"], "inReach Message");
    }

    #[test]
    fn embed_timestamp_is_rfc3339() {
        let embed = build_embed(&notification());
        let ts = embed["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn custom_base_url_is_used() {
        let client = DiscordApiClient::new(SecretString::from("tok"), Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9999");
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    // A server that accepts the connection and never answers must not
    // hang the caller; the client timeout has to surface as an error.
    #[tokio::test]
    async fn post_fails_against_stalled_server_instead_of_hanging() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stall = tokio::spawn(async move {
            let _socket = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let client =
            DiscordApiClient::new(SecretString::from("tok"), Duration::from_millis(250))
                .unwrap()
                .with_base_url(format!("http://{addr}"));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client.post_text("123", "hello"),
        )
        .await
        .expect("request must complete within the client timeout");
        assert!(matches!(result, Err(DispatchError::SendFailed(_))));

        stall.abort();
    }
}
