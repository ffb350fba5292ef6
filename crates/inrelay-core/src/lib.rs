//! Core pipeline for the inrelay bot.
//!
//! The poll-filter-parse-dispatch loop and the pieces it is built from:
//!
//! - [`filter`] -- pure qualification check for fetched mail
//! - [`parser`] -- inReach body extraction (text, link, coordinates)
//! - [`ledger`] -- in-memory dedup of already-relayed message ids
//! - [`poll`] -- the fixed-interval relay cycle
//! - [`command`] -- `ping` / `die` chat command handling
//! - [`traits`] -- adapter seams ([`MailSource`], [`Notifier`])
//!
//! Concrete adapters live in `inrelay-channels`; everything here runs
//! against the traits so the pipeline is testable with mocks.

pub mod command;
pub mod filter;
pub mod ledger;
pub mod parser;
pub mod poll;
pub mod traits;

pub use command::{CommandHandler, ExitIntent};
pub use ledger::DedupLedger;
pub use parser::InreachParser;
pub use poll::RelayService;
pub use traits::{MailSource, Notifier};
