//! Configuration schema.
//!
//! All structs take both `snake_case` and `camelCase` field names via
//! `#[serde(alias)]`; unknown fields are ignored so old config files
//! keep loading. Everything is read once at startup and immutable for
//! the process lifetime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secret::SecretString;

/// Root configuration for the relay.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// Mail inbox polling and filter settings.
    #[serde(default)]
    pub gmail: GmailConfig,

    /// Discord bot settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Pipeline tuning.
    #[serde(default)]
    pub relay: RelaySettings,
}

impl RelayConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: RelayConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Default config location: `~/.inrelay/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".inrelay")
            .join("config.json")
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gmail.senders.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "gmail.senders must list at least one address".into(),
            });
        }
        if self.discord.channel_id.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "discord.channel_id is required".into(),
            });
        }
        if self.gmail.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "gmail.poll_interval_secs must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Gmail inbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Path to the stored OAuth2 token file (`~` is expanded).
    #[serde(default = "default_token_path", alias = "tokenPath")]
    pub token_path: String,

    /// Sender addresses whose mail qualifies for relay.
    #[serde(default)]
    pub senders: Vec<String>,

    /// Exact subject line required on qualifying mail.
    #[serde(default)]
    pub subject: String,

    /// Seconds between inbox polls.
    #[serde(default = "default_poll_interval", alias = "pollIntervalSecs")]
    pub poll_interval_secs: u64,

    /// How many days back the inbox query looks. The filter cutoff
    /// still excludes anything older than process start; this only
    /// bounds the query.
    #[serde(default = "default_lookback_days", alias = "lookbackDays")]
    pub lookback_days: i64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout", alias = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,
}

fn default_token_path() -> String {
    "~/.inrelay/token.json".into()
}
fn default_poll_interval() -> u64 {
    60
}
fn default_lookback_days() -> i64 {
    7
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            senders: Vec::new(),
            subject: String::new(),
            poll_interval_secs: default_poll_interval(),
            lookback_days: default_lookback_days(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl GmailConfig {
    /// Token path with a `~/` prefix expanded to the home directory.
    pub fn expanded_token_path(&self) -> PathBuf {
        expand_home(&self.token_path)
    }
}

/// Discord bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the Discord Developer Portal.
    #[serde(default)]
    pub token: SecretString,

    /// Environment variable holding the bot token. Used when `token`
    /// is empty, so the token can stay out of the config file.
    #[serde(default, alias = "tokenEnv")]
    pub token_env: Option<String>,

    /// Channel notifications are posted to.
    #[serde(default, alias = "channelId")]
    pub channel_id: String,

    /// User IDs allowed to issue commands. Empty = allow all.
    #[serde(default, alias = "allowFrom")]
    pub allow_from: Vec<String>,

    /// Gateway WebSocket URL.
    #[serde(default = "default_gateway_url", alias = "gatewayUrl")]
    pub gateway_url: String,

    /// Gateway intents bitmask.
    #[serde(default = "default_intents")]
    pub intents: u32,
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".into()
}
fn default_intents() -> u32 {
    37377 // GUILDS + GUILD_MESSAGES + DIRECT_MESSAGES + MESSAGE_CONTENT
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: SecretString::default(),
            token_env: None,
            channel_id: String::new(),
            allow_from: Vec::new(),
            gateway_url: default_gateway_url(),
            intents: default_intents(),
        }
    }
}

impl DiscordConfig {
    /// Resolve the bot token: config value first, then the env var.
    pub fn resolved_token(&self) -> Option<SecretString> {
        if !self.token.is_empty() {
            return Some(self.token.clone());
        }
        self.token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty())
            .map(SecretString::new)
    }
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Dispatch attempts per message before it is marked seen and
    /// dropped. Bounds retry storms on a permanently failing post.
    #[serde(default = "default_max_dispatch_attempts", alias = "maxDispatchAttempts")]
    pub max_dispatch_attempts: u32,
}

fn default_max_dispatch_attempts() -> u32 {
    5
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_dispatch_attempts: default_max_dispatch_attempts(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.gmail.poll_interval_secs, 60);
        assert_eq!(cfg.gmail.lookback_days, 7);
        assert_eq!(cfg.gmail.request_timeout_secs, 30);
        assert_eq!(cfg.relay.max_dispatch_attempts, 5);
        assert_eq!(cfg.discord.intents, 37377);
        assert!(cfg.discord.gateway_url.starts_with("wss://gateway.discord.gg"));
    }

    #[test]
    fn parses_snake_and_camel_case() {
        let json = r#"{
            "gmail": {
                "senders": ["no.reply.inreach@garmin.com"],
                "subject": "inReach message from Darren Caldwell",
                "pollIntervalSecs": 30,
                "tokenPath": "/tmp/token.json"
            },
            "discord": {
                "channelId": "123456789",
                "tokenEnv": "DISCORD_BOT_TOKEN"
            },
            "relay": {
                "maxDispatchAttempts": 3
            }
        }"#;
        let cfg: RelayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.gmail.poll_interval_secs, 30);
        assert_eq!(cfg.gmail.token_path, "/tmp/token.json");
        assert_eq!(cfg.discord.channel_id, "123456789");
        assert_eq!(cfg.discord.token_env.as_deref(), Some("DISCORD_BOT_TOKEN"));
        assert_eq!(cfg.relay.max_dispatch_attempts, 3);
    }

    #[test]
    fn validate_requires_senders() {
        let cfg = RelayConfig {
            discord: DiscordConfig {
                channel_id: "1".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn validate_requires_channel_id() {
        let cfg = RelayConfig {
            gmail: GmailConfig {
                senders: vec!["a@b.com".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let cfg = RelayConfig {
            gmail: GmailConfig {
                senders: vec!["a@b.com".into()],
                poll_interval_secs: 0,
                ..Default::default()
            },
            discord: DiscordConfig {
                channel_id: "1".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let err = RelayConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn resolved_token_prefers_config_value() {
        let cfg = DiscordConfig {
            token: SecretString::new("from-config"),
            token_env: Some("INRELAY_TEST_TOKEN_UNSET".into()),
            ..Default::default()
        };
        assert_eq!(cfg.resolved_token().unwrap().expose(), "from-config");
    }

    #[test]
    fn resolved_token_none_when_unset() {
        let cfg = DiscordConfig {
            token_env: Some("INRELAY_TEST_TOKEN_DEFINITELY_UNSET".into()),
            ..Default::default()
        };
        assert!(cfg.resolved_token().is_none());
    }

    #[test]
    fn expand_home_passthrough_for_absolute() {
        assert_eq!(expand_home("/etc/x"), PathBuf::from("/etc/x"));
    }
}
