//! The fixed-interval relay cycle.
//!
//! Each tick runs one pass: query the mail source, filter, dedup-check,
//! parse, dispatch, mark seen. Per-message failures are isolated so one
//! bad message never blocks the rest of the batch; transient fetch
//! failures end the cycle and the loop resumes next tick; an auth
//! failure is the only thing that stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use inrelay_types::error::FetchError;
use inrelay_types::message::{FilterCriteria, Notification};

use crate::filter::qualifies;
use crate::ledger::DedupLedger;
use crate::parser::InreachParser;
use crate::traits::{MailSource, Notifier};

/// Embed title used when a message arrives with an empty subject.
const FALLBACK_TITLE: &str = "inReach Message";

/// The poll loop: owns the pipeline pieces and drives one cycle per
/// tick until cancelled or fatally failed.
pub struct RelayService {
    source: Arc<dyn MailSource>,
    notifier: Arc<dyn Notifier>,
    ledger: Arc<DedupLedger>,
    parser: InreachParser,
    criteria: FilterCriteria,
    interval: Duration,
    channel_id: String,
    max_dispatch_attempts: u32,
}

impl RelayService {
    /// Assemble the loop. The ledger is passed in (not constructed
    /// here) so its lifetime and sharing are the caller's decision.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn MailSource>,
        notifier: Arc<dyn Notifier>,
        ledger: Arc<DedupLedger>,
        criteria: FilterCriteria,
        interval: Duration,
        channel_id: String,
        max_dispatch_attempts: u32,
    ) -> Self {
        Self {
            source,
            notifier,
            ledger,
            parser: InreachParser::new(),
            criteria,
            interval,
            channel_id,
            max_dispatch_attempts,
        }
    }

    /// Run until cancelled or a fatal fetch error.
    ///
    /// The first cycle runs immediately; subsequent cycles follow the
    /// configured interval. Returns `Ok(())` on cancellation and
    /// `Err` only for fatal errors (invalid credentials), so the
    /// caller can exit with a distinct status.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), FetchError> {
        info!(
            interval_secs = self.interval.as_secs(),
            channel_id = %self.channel_id,
            "relay poll loop started"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("relay poll loop shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    match self.run_cycle(&cancel).await {
                        Ok(relayed) => {
                            if relayed > 0 {
                                info!(relayed, "cycle complete");
                            } else {
                                debug!("cycle complete, nothing to relay");
                            }
                        }
                        Err(e) if e.is_fatal() => {
                            error!(error = %e, "fatal fetch error, stopping poll loop");
                            return Err(e);
                        }
                        Err(e) => {
                            warn!(error = %e, "cycle failed, will retry next tick");
                        }
                    }
                }
            }
        }
    }

    /// One query-filter-parse-dispatch pass. Returns how many messages
    /// were relayed.
    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<usize, FetchError> {
        let messages = self.source.fetch_recent().await?;
        debug!(count = messages.len(), "fetched candidate messages");

        let mut relayed = 0;
        for msg in &messages {
            if !qualifies(msg, &self.criteria) {
                debug!(id = %msg.id, "message does not qualify, skipping");
                continue;
            }
            if self.ledger.seen(&msg.id) {
                debug!(id = %msg.id, "message already relayed, skipping");
                continue;
            }

            // A die command can land mid-cycle. Abandon before
            // dispatch so nothing ends up parsed-but-unmarked in a
            // half-relayed state.
            if cancel.is_cancelled() {
                info!("cycle abandoned by cancellation");
                return Ok(relayed);
            }

            let parsed = self.parser.parse(&msg.body);
            let title = if msg.subject.is_empty() {
                FALLBACK_TITLE.to_string()
            } else {
                msg.subject.clone()
            };
            let notification = Notification {
                title,
                text: parsed.text,
                link: parsed.tracking_link,
                coordinates: parsed.coordinates,
            };

            match self
                .notifier
                .post_notification(&self.channel_id, &notification)
                .await
            {
                Ok(()) => {
                    self.ledger.mark_seen(&msg.id);
                    relayed += 1;
                    info!(id = %msg.id, "message relayed");
                }
                Err(e) => {
                    let attempts = self.ledger.record_failure(&msg.id);
                    if attempts >= self.max_dispatch_attempts {
                        // Permanently failing post; stop retrying it.
                        self.ledger.mark_seen(&msg.id);
                        error!(
                            id = %msg.id,
                            attempts,
                            error = %e,
                            "dispatch failed at retry bound, dropping message"
                        );
                    } else {
                        warn!(
                            id = %msg.id,
                            attempts,
                            error = %e,
                            "dispatch failed, will retry next cycle"
                        );
                    }
                }
            }
        }

        Ok(relayed)
    }
}
