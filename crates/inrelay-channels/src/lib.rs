//! Concrete channel adapters for the inrelay bot.
//!
//! - [`gmail`] -- Gmail REST client and OAuth2 token provider,
//!   implementing [`MailSource`](inrelay_core::MailSource)
//! - [`discord`] -- Discord REST client and Gateway command listener,
//!   implementing [`Notifier`](inrelay_core::Notifier)

pub mod discord;
pub mod gmail;

pub use discord::{DiscordApiClient, DiscordGateway};
pub use gmail::{GmailClient, TokenProvider};
