//! Mail qualification check.
//!
//! A message is relayed only when sender, subject, and arrival time all
//! match the configured criteria. Pure function, no side effects.

use inrelay_types::message::{FilterCriteria, MailMessage};

/// Whether a fetched message qualifies for relay.
///
/// All three conditions are required:
/// - the sender address equals one of the configured addresses
///   (case-insensitive, display name stripped)
/// - the subject equals the configured subject exactly
/// - the message arrived strictly after the cutoff timestamp
pub fn qualifies(msg: &MailMessage, criteria: &FilterCriteria) -> bool {
    let addr = msg.sender_address();
    let sender_ok = criteria
        .senders
        .iter()
        .any(|s| s.eq_ignore_ascii_case(addr));

    sender_ok && msg.subject == criteria.subject && msg.received_at > criteria.cutoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn criteria() -> FilterCriteria {
        FilterCriteria {
            senders: vec!["no.reply.inreach@garmin.com".into()],
            subject: "inReach message from Darren Caldwell".into(),
            cutoff: Utc::now() - Duration::minutes(5),
        }
    }

    fn message() -> MailMessage {
        MailMessage {
            id: "msg-1".into(),
            sender: "Garmin inReach <no.reply.inreach@garmin.com>".into(),
            subject: "inReach message from Darren Caldwell".into(),
            received_at: Utc::now(),
            body: String::new(),
        }
    }

    #[test]
    fn qualifying_message_passes() {
        assert!(qualifies(&message(), &criteria()));
    }

    #[test]
    fn wrong_sender_rejected() {
        let mut msg = message();
        msg.sender = "spoofer@example.com".into();
        assert!(!qualifies(&msg, &criteria()));
    }

    #[test]
    fn wrong_subject_rejected() {
        let mut msg = message();
        msg.subject = "Your invoice is ready".into();
        assert!(!qualifies(&msg, &criteria()));
    }

    #[test]
    fn subject_match_is_exact() {
        let mut msg = message();
        msg.subject = "inReach message from Darren Caldwell ".into();
        assert!(!qualifies(&msg, &criteria()));
    }

    #[test]
    fn mail_before_cutoff_rejected() {
        let mut msg = message();
        msg.received_at = Utc::now() - Duration::hours(1);
        assert!(!qualifies(&msg, &criteria()));
    }

    #[test]
    fn mail_exactly_at_cutoff_rejected() {
        let crit = criteria();
        let mut msg = message();
        msg.received_at = crit.cutoff;
        assert!(!qualifies(&msg, &crit));
    }

    #[test]
    fn sender_match_ignores_case() {
        let mut msg = message();
        msg.sender = "No.Reply.inReach@Garmin.COM".into();
        assert!(qualifies(&msg, &criteria()));
    }

    #[test]
    fn any_configured_sender_matches() {
        let mut crit = criteria();
        crit.senders.push("backup@example.com".into());
        let mut msg = message();
        msg.sender = "backup@example.com".into();
        assert!(qualifies(&msg, &crit));
    }

    #[test]
    fn empty_sender_list_rejects_everything() {
        let mut crit = criteria();
        crit.senders.clear();
        assert!(!qualifies(&message(), &crit));
    }
}
