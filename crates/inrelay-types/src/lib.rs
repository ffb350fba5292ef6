//! Shared types for the inrelay Gmail-to-Discord relay.
//!
//! - [`config`] -- JSON configuration schema
//! - [`error`] -- error taxonomy (fetch, dispatch, config)
//! - [`message`] -- mail, parse, and notification data model
//! - [`secret`] -- redacting wrapper for tokens

pub mod config;
pub mod error;
pub mod message;
pub mod secret;

pub use config::RelayConfig;
pub use error::{ConfigError, DispatchError, FetchError};
pub use message::{
    CommandEvent, Coordinates, FilterCriteria, MailMessage, Notification, ParsedMessage,
};
pub use secret::SecretString;
