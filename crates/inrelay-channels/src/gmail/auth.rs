//! Stored OAuth2 credential handling.
//!
//! The relay never runs the interactive authorization flow. A token
//! file in Google's authorized-user format (produced by an external
//! bootstrap, see the README) is loaded at startup, refreshed against
//! the token endpoint when close to expiry, and persisted back with
//! 0600 permissions so rotated tokens survive a crash.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use inrelay_types::error::FetchError;

/// Refresh this many seconds before the recorded expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}

/// On-disk token file, Google authorized-user format.
///
/// The access token field is named `token` on disk (Google's own
/// serialization); `access_token` is accepted as an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// Current access token.
    #[serde(alias = "access_token")]
    pub token: String,

    /// Long-lived refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// OAuth2 token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    /// OAuth2 client id paired with the refresh token.
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret paired with the refresh token.
    #[serde(default)]
    pub client_secret: String,

    /// Granted scopes, informational.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Access token expiry. Google writes either RFC 3339 or a naive
    /// UTC timestamp here depending on library version, so this stays
    /// a string and [`expiry_utc`](Self::expiry_utc) parses both.
    #[serde(default)]
    pub expiry: Option<String>,
}

impl StoredToken {
    /// Parsed expiry instant, if present and well-formed.
    pub fn expiry_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiry.as_deref()?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        // Naive UTC form, e.g. "2026-08-30T12:34:56.123456".
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Whether the access token is expired or about to be.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_utc() {
            Some(expiry) => now + chrono::Duration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            // No usable expiry recorded: assume stale and refresh.
            None => true,
        }
    }
}

/// Token endpoint response for a refresh grant.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Auto-refreshing credential provider for the Gmail client.
pub struct TokenProvider {
    path: PathBuf,
    http: reqwest::Client,
    state: Mutex<StoredToken>,
}

impl TokenProvider {
    /// Load the token file. Failure here is an auth problem: the
    /// process cannot do anything useful without credentials.
    pub fn load(path: &Path, request_timeout: Duration) -> Result<Self, FetchError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            FetchError::Auth(format!("cannot read token file {}: {e}", path.display()))
        })?;
        let state: StoredToken = serde_json::from_str(&contents).map_err(|e| {
            FetchError::Auth(format!("cannot parse token file {}: {e}", path.display()))
        })?;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FetchError::Transient(format!("http client: {e}")))?;

        info!(path = %path.display(), "loaded stored credentials");
        Ok(Self {
            path: path.to_path_buf(),
            http,
            state: Mutex::new(state),
        })
    }

    /// A currently-valid access token, refreshing first if needed.
    pub async fn access_token(&self) -> Result<String, FetchError> {
        let mut state = self.state.lock().await;
        if state.needs_refresh(Utc::now()) {
            debug!("access token near expiry, refreshing");
            self.refresh(&mut state).await?;
        }
        Ok(state.token.clone())
    }

    /// Refresh unconditionally and return the new token. Used after a
    /// rejected API call, in case the recorded expiry was wrong.
    pub async fn force_refresh(&self) -> Result<String, FetchError> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await?;
        Ok(state.token.clone())
    }

    async fn refresh(&self, state: &mut StoredToken) -> Result<(), FetchError> {
        let refresh_token = state.refresh_token.clone().ok_or_else(|| {
            FetchError::Auth("token expired and no refresh token is stored".into())
        })?;
        if state.client_id.is_empty() || state.client_secret.is_empty() {
            return Err(FetchError::Auth(
                "token file is missing client_id/client_secret".into(),
            ));
        }

        let params = [
            ("client_id", state.client_id.as_str()),
            ("client_secret", state.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(&state.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("token refresh request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "unknown error".into());
            // invalid_grant and friends mean the refresh token is dead;
            // server-side trouble is worth retrying next cycle.
            if status.is_client_error() {
                return Err(FetchError::Auth(format!(
                    "token refresh rejected ({status}): {body}"
                )));
            }
            return Err(FetchError::Transient(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let refreshed: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("token refresh response: {e}")))?;

        state.token = refreshed.access_token;
        if let Some(rotated) = refreshed.refresh_token {
            state.refresh_token = Some(rotated);
        }
        state.expiry = refreshed.expires_in.map(|secs| {
            (Utc::now() + chrono::Duration::seconds(secs)).to_rfc3339()
        });

        // Persist immediately so a rotated refresh token survives a
        // crash between now and the next poll.
        if let Err(e) = persist(&self.path, state) {
            warn!(error = %e, "failed to persist refreshed token");
        }

        info!("access token refreshed");
        Ok(())
    }
}

/// Write the token file atomically with 0600 permissions.
fn persist(path: &Path, state: &StoredToken) -> Result<(), String> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| format!("serialize token: {e}"))?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).map_err(|e| format!("write token file: {e}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))
            .map_err(|e| format!("set token file permissions: {e}"))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| format!("rename token file: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expiry: Option<&str>) -> StoredToken {
        StoredToken {
            token: "ya29.access".into(),
            refresh_token: Some("1//refresh".into()),
            token_uri: default_token_uri(),
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            scopes: vec!["https://www.googleapis.com/auth/gmail.readonly".into()],
            expiry: expiry.map(String::from),
        }
    }

    #[test]
    fn parses_google_token_file_format() {
        // Field name is "token" in Google's serialization.
        let json = r#"{
            "token": "ya29.abc",
            "refresh_token": "1//xyz",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/gmail.readonly"],
            "expiry": "2026-08-30T12:00:00Z"
        }"#;
        let t: StoredToken = serde_json::from_str(json).unwrap();
        assert_eq!(t.token, "ya29.abc");
        assert_eq!(t.refresh_token.as_deref(), Some("1//xyz"));
    }

    #[test]
    fn accepts_access_token_alias() {
        let json = r#"{"access_token": "tok"}"#;
        let t: StoredToken = serde_json::from_str(json).unwrap();
        assert_eq!(t.token, "tok");
        assert_eq!(t.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn expiry_parses_rfc3339() {
        let t = token(Some("2026-08-30T12:00:00+00:00"));
        assert!(t.expiry_utc().is_some());
    }

    #[test]
    fn expiry_parses_naive_utc() {
        // google-auth historically writes naive isoformat.
        let t = token(Some("2026-08-30T12:00:00.123456"));
        let parsed = t.expiry_utc().unwrap();
        assert_eq!(parsed.timezone(), Utc);
    }

    #[test]
    fn expiry_garbage_is_none() {
        assert!(token(Some("soon")).expiry_utc().is_none());
    }

    #[test]
    fn needs_refresh_when_expired() {
        let t = token(Some("2020-01-01T00:00:00Z"));
        assert!(t.needs_refresh(Utc::now()));
    }

    #[test]
    fn needs_refresh_within_skew() {
        let soon = (Utc::now() + chrono::Duration::seconds(30)).to_rfc3339();
        let t = token(Some(&soon));
        assert!(t.needs_refresh(Utc::now()));
    }

    #[test]
    fn no_refresh_when_fresh() {
        let later = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        let t = token(Some(&later));
        assert!(!t.needs_refresh(Utc::now()));
    }

    #[test]
    fn missing_expiry_refreshes_eagerly() {
        assert!(token(None).needs_refresh(Utc::now()));
    }

    #[test]
    fn load_missing_file_is_auth_error() {
        // TokenProvider deliberately has no Debug impl (it holds
        // secrets), so take the error side without unwrap_err.
        let err = match TokenProvider::load(
            Path::new("/nonexistent/token.json"),
            Duration::from_secs(5),
        ) {
            Ok(_) => panic!("loading a missing token file must fail"),
            Err(e) => e,
        };
        assert!(matches!(err, FetchError::Auth(_)));
    }

    #[test]
    fn load_unparseable_file_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "not json").unwrap();

        let err = match TokenProvider::load(&path, Duration::from_secs(5)) {
            Ok(_) => panic!("loading an unparseable token file must fail"),
            Err(e) => e,
        };
        assert!(matches!(err, FetchError::Auth(_)));
    }

    #[tokio::test]
    async fn fresh_token_returned_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let later = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        fs::write(
            &path,
            serde_json::to_string(&token(Some(&later))).unwrap(),
        )
        .unwrap();

        let provider = TokenProvider::load(&path, Duration::from_secs(5)).unwrap();
        let tok = provider.access_token().await.unwrap();
        assert_eq!(tok, "ya29.access");
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let mut t = token(Some("2020-01-01T00:00:00Z"));
        t.refresh_token = None;
        fs::write(&path, serde_json::to_string(&t).unwrap()).unwrap();

        let provider = TokenProvider::load(&path, Duration::from_secs(5)).unwrap();
        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));
    }

    #[cfg(unix)]
    #[test]
    fn persist_sets_0600_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        persist(&path, &token(None)).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");

        // Round-trips through the same format.
        let loaded: StoredToken =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.token, "ya29.access");
    }
}
