//! Gmail REST client.
//!
//! Thin read-only wrapper over the Gmail API: list message ids matching
//! a sender/subject query, fetch each in full, decode to [`MailMessage`].
//! The poll loop owns retry policy; this client only classifies failures
//! into the [`FetchError`] taxonomy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::{debug, warn};

use inrelay_core::traits::MailSource;
use inrelay_types::config::GmailConfig;
use inrelay_types::error::FetchError;
use inrelay_types::message::MailMessage;

use super::auth::TokenProvider;
use super::types::{extract_plain_text, Message, MessageList};

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Cap per list request; queries are already narrow.
const MAX_RESULTS: u32 = 100;

/// Read-only Gmail inbox client.
pub struct GmailClient {
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    base_url: String,
    senders: Vec<String>,
    subject: String,
    lookback_days: i64,
}

impl GmailClient {
    pub fn new(config: &GmailConfig, tokens: Arc<TokenProvider>) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Transient(format!("http client: {e}")))?;

        Ok(Self {
            http,
            tokens,
            base_url: DEFAULT_BASE_URL.to_string(),
            senders: config.senders.clone(),
            subject: config.subject.clone(),
            lookback_days: config.lookback_days,
        })
    }

    /// Point the client at a different API root. Test hook.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the inbox search query for one sender.
    ///
    /// `after:` takes a date in the account's local interpretation; the
    /// filter cutoff does the precise time comparison, this just keeps
    /// the result set small.
    fn build_query(&self, sender: &str, now: DateTime<Utc>) -> String {
        let after = (now - chrono::Duration::days(self.lookback_days)).format("%Y/%m/%d");
        let mut query = format!("from:{sender}");
        if !self.subject.is_empty() {
            // Gmail's query syntax has no escape for quotes inside a
            // quoted phrase; strip them rather than break the query.
            let subject = self.subject.replace('"', "");
            query.push_str(&format!(" subject:\"{subject}\""));
        }
        query.push_str(&format!(" after:{after}"));
        query
    }

    /// Authorized GET with a single forced-refresh retry on 401, in
    /// case the stored expiry was wrong.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("gmail request: {e}")))?;

        let resp = if resp.status() == StatusCode::UNAUTHORIZED {
            debug!("gmail rejected access token, forcing refresh");
            let token = self.tokens.force_refresh().await?;
            self.http
                .get(url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await
                .map_err(|e| FetchError::Transient(format!("gmail request: {e}")))?
        } else {
            resp
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        resp.json()
            .await
            .map_err(|e| FetchError::Transient(format!("gmail response body: {e}")))
    }

    async fn list_ids(&self, query: &str) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/users/me/messages", self.base_url);
        let max_results = MAX_RESULTS.to_string();
        let list: MessageList = self
            .get_json(&url, &[("q", query), ("maxResults", &max_results)])
            .await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, id: &str) -> Result<Message, FetchError> {
        let url = format!("{}/users/me/messages/{id}", self.base_url);
        self.get_json(&url, &[("format", "full")]).await
    }

    fn to_mail_message(&self, msg: Message) -> MailMessage {
        let received_at = msg
            .internal_date_ms()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        let body = extract_plain_text(&msg.payload).unwrap_or_default();
        MailMessage {
            sender: msg.header("From").to_string(),
            subject: msg.header("Subject").to_string(),
            received_at,
            body,
            id: msg.id,
        }
    }
}

fn classify_status(status: StatusCode, body: &str) -> FetchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FetchError::Auth(format!("gmail returned {status}: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        _ => FetchError::Transient(format!("gmail returned {status}: {body}")),
    }
}

#[async_trait]
impl MailSource for GmailClient {
    async fn fetch_recent(&self) -> Result<Vec<MailMessage>, FetchError> {
        let now = Utc::now();
        let mut out = Vec::new();
        for sender in &self.senders {
            let query = self.build_query(sender, now);
            let ids = self.list_ids(&query).await?;
            debug!(sender, count = ids.len(), "listed inbox matches");
            for id in ids {
                match self.get_message(&id).await {
                    Ok(msg) => out.push(self.to_mail_message(msg)),
                    // A single unreadable message should not stall the
                    // whole cycle unless it is an auth failure.
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!(id, error = %e, "skipping unreadable message"),
                }
            }
        }
        Ok(out)
    }
}
