//! Redacting wrapper for token values.
//!
//! [`SecretString`] keeps bot tokens and refresh tokens out of logs,
//! `Debug` output, and serialized config dumps. The inner value is only
//! reachable through [`expose()`](SecretString::expose).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A string that must not leak into logs or serialized output.
///
/// `Debug` and `Display` print `[REDACTED]`, `Serialize` emits an empty
/// string, and `Deserialize` accepts a plain string so existing config
/// files keep working.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The actual value. Only call this where the token is about to be
    /// put on the wire (Authorization headers, Gateway identify).
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no value is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "\"\"")
        } else {
            write!(f, "\"[REDACTED]\"")
        }
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            write!(f, "[REDACTED]")
        }
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Never write the real value back out.
        serializer.serialize_str("")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(SecretString(String::deserialize(deserializer)?))
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        SecretString(s.to_string())
    }
}
