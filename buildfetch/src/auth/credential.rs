//! Credential types.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// App (client) credentials sent as HTTP Basic authorization to the token
/// endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub client_id: String,
    pub secret: String,
}

impl AppCredentials {
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            secret: secret.into(),
        }
    }

    /// `Authorization` header value for token requests.
    pub fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.secret);
        format!("basic {}", STANDARD.encode(raw.as_bytes()))
    }
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// An access credential with its expiry and an optional refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub access_expiry: DateTime<Utc>,
    pub refresh_token: Option<String>,
    pub refresh_expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// A credential without refresh capability.
    pub fn new(access_token: impl Into<String>, access_expiry: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            access_expiry,
            refresh_token: None,
            refresh_expiry: None,
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh(
        mut self,
        refresh_token: impl Into<String>,
        refresh_expiry: Option<DateTime<Utc>>,
    ) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self.refresh_expiry = refresh_expiry;
        self
    }

    /// Whether the access token is still usable at `now`.
    pub fn is_access_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.access_expiry
    }

    /// The refresh token, if one exists and has not expired at `now`.
    ///
    /// A refresh token without an expiry is considered live.
    pub fn live_refresh_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.refresh_token.as_deref()?;
        match self.refresh_expiry {
            Some(expiry) if now >= expiry => None,
            _ => Some(token),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("access_expiry", &self.access_expiry)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("refresh_expiry", &self.refresh_expiry)
            .finish()
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl From<TokenResponse> for Credential {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            access_expiry: response.expires_at,
            refresh_token: response.refresh_token,
            refresh_expiry: response.refresh_expires_at,
        }
    }
}
