//! Gmail adapter.
//!
//! Supplies the poll loop with decoded inbox messages:
//!
//! - [`auth`] -- stored OAuth2 token loading and refresh
//! - [`api`] -- Gmail REST v1 client, `MailSource` implementation
//! - [`types`] -- wire types for list/get responses
//!
//! The interactive authorization dance is not performed here: the
//! token file is produced externally (see the README) and this module
//! only consumes and refreshes it.

pub mod api;
pub mod auth;
pub mod types;

pub use api::GmailClient;
pub use auth::TokenProvider;
