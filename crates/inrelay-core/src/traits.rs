//! Adapter traits the pipeline runs against.
//!
//! The poll loop and command handler only ever see these seams; the
//! Gmail and Discord implementations live in `inrelay-channels`, and
//! tests substitute mocks.

use async_trait::async_trait;

use inrelay_types::error::{DispatchError, FetchError};
use inrelay_types::message::{MailMessage, Notification};

/// A mail inbox the poll loop can query.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Fetch recent candidate messages, already decoded to plain text.
    ///
    /// The source applies its own coarse query window; precise
    /// qualification (sender, subject, cutoff) happens in the filter.
    async fn fetch_recent(&self) -> Result<Vec<MailMessage>, FetchError>;
}

/// A chat channel notifications and replies can be posted to.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a formatted notification (embed) to a channel.
    async fn post_notification(
        &self,
        channel_id: &str,
        notification: &Notification,
    ) -> Result<(), DispatchError>;

    /// Post a plain text message to a channel.
    async fn post_text(&self, channel_id: &str, text: &str) -> Result<(), DispatchError>;
}
