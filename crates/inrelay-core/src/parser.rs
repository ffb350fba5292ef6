//! inReach email body extraction.
//!
//! Garmin's notification template looks like:
//!
//! ```text
//! I'm checking in. Everything is OK.
//!
//! View the location or send a reply to Darren Caldwell:
//! https://eur.explore.garmin.com/textmessage/txtmsg?extId=...
//!
//! Darren Caldwell sent this message from: Lat 53.344835 Lon -6.276734
//!
//! Do not reply directly to this message.
//! ...
//! ```
//!
//! The user-written text is everything before the `View the location`
//! line; the rest is template boilerplate we strip. Parsing is total:
//! template drift upstream degrades individual fields to `None` but
//! never fails the message.

use regex::Regex;
use tracing::{debug, warn};

use inrelay_types::message::{Coordinates, ParsedMessage};

/// Placeholder used when no user text could be isolated.
const NO_MESSAGE_TEXT: &str = "No message content found";

/// Boilerplate line that terminates the user-written text.
const BOILERPLATE_MARKER: &str = "View the location";

/// Line whose successor holds the tracking URL in the known template,
/// used as a fallback when the URL regex finds nothing.
const LINK_HEADER_LINE: &str = "View the location or send a reply";

/// Parser for Garmin inReach notification bodies.
pub struct InreachParser {
    link_pattern: Regex,
    location_pattern: Regex,
}

impl Default for InreachParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InreachParser {
    /// Compile the extraction patterns.
    pub fn new() -> Self {
        Self {
            link_pattern: Regex::new(r"https?://\S*garmin\.com/textmessage/txtmsg\?\S+").unwrap(),
            location_pattern: Regex::new(r"Lat\s+(-?\d+\.\d+)\s+Lon\s+(-?\d+\.\d+)").unwrap(),
        }
    }

    /// Extract message text, tracking link, and coordinates.
    ///
    /// Total over any input: fields that cannot be extracted come back
    /// as the placeholder / `None`, with a log line saying what was
    /// missing.
    pub fn parse(&self, body: &str) -> ParsedMessage {
        let text = self.extract_text(body);
        let tracking_link = self.extract_link(body);
        let coordinates = self.extract_coordinates(body);

        if tracking_link.is_none() {
            warn!("no tracking link found in mail body");
        }
        if coordinates.is_none() {
            debug!("no coordinates found in mail body");
        }

        ParsedMessage {
            text,
            tracking_link,
            coordinates,
        }
    }

    /// The user-written message: trimmed non-empty lines before the
    /// first boilerplate marker.
    fn extract_text(&self, body: &str) -> String {
        let mut lines = Vec::new();
        for line in body.trim().lines() {
            let line = line.trim();
            if line.starts_with(BOILERPLATE_MARKER) {
                break;
            }
            if !line.is_empty() {
                lines.push(line);
            }
        }

        if lines.is_empty() {
            NO_MESSAGE_TEXT.to_string()
        } else {
            lines.join("\n")
        }
    }

    /// First tracking-domain URL in the body; falls back to the line
    /// after the known link header when the regex finds nothing.
    fn extract_link(&self, body: &str) -> Option<String> {
        if let Some(m) = self.link_pattern.find(body) {
            return Some(m.as_str().to_string());
        }

        // Template fallback: the URL sits on the line below the
        // "View the location or send a reply to <name>:" header.
        let lines: Vec<&str> = body.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if line.contains(LINK_HEADER_LINE) {
                if let Some(next) = lines.get(i + 1) {
                    let next = next.trim();
                    if next.contains("garmin.com") {
                        debug!("tracking link recovered from template position");
                        return Some(next.to_string());
                    }
                }
            }
        }

        None
    }

    /// `Lat <f> Lon <f>` pair, range-validated. Out-of-range values
    /// are dropped rather than relayed.
    fn extract_coordinates(&self, body: &str) -> Option<Coordinates> {
        let caps = self.location_pattern.captures(body)?;
        let lat: f64 = caps[1].parse().ok()?;
        let lon: f64 = caps[2].parse().ok()?;

        match Coordinates::new(lat, lon) {
            Some(c) => Some(c),
            None => {
                warn!(lat, lon, "coordinates out of range, dropping pair");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
I'm checking in. Everything is OK.

View the location or send a reply to Darren Caldwell:
https://eur.explore.garmin.com/textmessage/txtmsg?extId=08dd417b-5ac1-119e-000d-3aa7bc4d0000&adr=cynicaldead%40gmail.com

Darren Caldwell sent this message from: Lat 53.344835 Lon -6.276734

Do not reply directly to this message.

This message was sent to you using the inReach two-way satellite communicator with GPS. To learn more, visit http://explore.garmin.com/inreach.
";

    #[test]
    fn full_sample_extracts_all_fields() {
        let parsed = InreachParser::new().parse(SAMPLE);
        assert_eq!(parsed.text, "I'm checking in. Everything is OK.");
        assert_eq!(
            parsed.tracking_link.as_deref(),
            Some("https://eur.explore.garmin.com/textmessage/txtmsg?extId=08dd417b-5ac1-119e-000d-3aa7bc4d0000&adr=cynicaldead%40gmail.com")
        );
        let coords = parsed.coordinates.unwrap();
        assert!((coords.latitude - 53.344835).abs() < 1e-9);
        assert!((coords.longitude - -6.276734).abs() < 1e-9);
    }

    #[test]
    fn boilerplate_footer_is_stripped() {
        let parsed = InreachParser::new().parse(SAMPLE);
        assert!(!parsed.text.contains("Do not reply"));
        assert!(!parsed.text.contains("satellite communicator"));
        assert!(!parsed.text.contains("View the location"));
    }

    #[test]
    fn multi_line_message_preserved() {
        let body = "First line.\nSecond line.\n\nView the location or send a reply:\n";
        let parsed = InreachParser::new().parse(body);
        assert_eq!(parsed.text, "First line.\nSecond line.");
    }

    #[test]
    fn empty_body_yields_placeholder() {
        let parsed = InreachParser::new().parse("");
        assert_eq!(parsed.text, NO_MESSAGE_TEXT);
        assert!(parsed.tracking_link.is_none());
        assert!(parsed.coordinates.is_none());
    }

    #[test]
    fn garbage_body_never_panics() {
        let parser = InreachParser::new();
        for body in ["\0\0\0", "Lat Lon", "https://", "Lat 1 Lon 2", "🔥🦅✨"] {
            let parsed = parser.parse(body);
            assert!(parsed.coordinates.is_none());
        }
    }

    #[test]
    fn missing_link_is_none() {
        let parsed = InreachParser::new().parse("Just text, no URL here.");
        assert!(parsed.tracking_link.is_none());
        assert_eq!(parsed.text, "Just text, no URL here.");
    }

    #[test]
    fn link_fallback_from_template_position() {
        // URL mangled enough that the regex misses the query string,
        // but it still sits below the header line.
        let body = "\
Hello.

View the location or send a reply to Darren Caldwell:
eur.explore.garmin.com/textmessage/txtmsg broken-no-scheme
";
        let parsed = InreachParser::new().parse(body);
        assert_eq!(
            parsed.tracking_link.as_deref(),
            Some("eur.explore.garmin.com/textmessage/txtmsg broken-no-scheme")
        );
    }

    #[test]
    fn non_garmin_url_not_taken_as_link() {
        let body = "Check https://example.com/textmessage/txtmsg?x=1 instead";
        let parsed = InreachParser::new().parse(body);
        assert!(parsed.tracking_link.is_none());
    }

    #[test]
    fn out_of_range_latitude_dropped() {
        let body = "Sent from: Lat 95.000000 Lon -6.276734";
        let parsed = InreachParser::new().parse(body);
        assert!(parsed.coordinates.is_none());
    }

    #[test]
    fn out_of_range_longitude_dropped() {
        let body = "Sent from: Lat 53.344835 Lon 200.500000";
        let parsed = InreachParser::new().parse(body);
        assert!(parsed.coordinates.is_none());
    }

    #[test]
    fn negative_coordinates_parse() {
        let body = "Sent from: Lat -33.868820 Lon 151.209290";
        let coords = InreachParser::new().parse(body).coordinates.unwrap();
        assert!(coords.latitude < 0.0);
        assert!(coords.longitude > 0.0);
    }

    #[test]
    fn coordinates_require_decimal_form() {
        // Integer-only degrees are not the inReach format.
        let parsed = InreachParser::new().parse("Lat 53 Lon -6");
        assert!(parsed.coordinates.is_none());
    }
}
