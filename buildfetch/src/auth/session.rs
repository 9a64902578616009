//! Authenticated session with expiry-aware token renewal.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::credential::{AppCredentials, Credential, TokenResponse};
use super::{AuthError, AuthResult};
use crate::transport::{Request, Response, Transport};

/// How a session performs a full login.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthFlow {
    /// Service login with the app credentials only.
    ClientCredentials,
    /// Interactive login: a one-time exchange code obtained by the user.
    ExchangeCode { code: String },
}

impl AuthFlow {
    fn grant_form(&self) -> Vec<(String, String)> {
        match self {
            AuthFlow::ClientCredentials => form(&[
                ("grant_type", "client_credentials"),
                ("token_type", "eg1"),
            ]),
            AuthFlow::ExchangeCode { code } => form(&[
                ("grant_type", "exchange_code"),
                ("exchange_code", code),
                ("token_type", "eg1"),
            ]),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AuthFlow::ClientCredentials => "client_credentials",
            AuthFlow::ExchangeCode { .. } => "exchange_code",
        }
    }
}

impl std::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No login has succeeded yet.
    Unauthenticated,
    /// The access token is valid.
    Authenticated,
    /// The access token has expired; the next request renews it.
    Expired,
}

/// An OAuth session.
///
/// The credential lives behind an async mutex held across the whole
/// check-then-renew sequence, so concurrent callers that find an expired
/// token trigger a single refresh or login between them.
pub struct Session {
    transport: Arc<dyn Transport>,
    token_url: String,
    app: Option<AppCredentials>,
    flow: AuthFlow,
    credential: Mutex<Option<Credential>>,
}

impl Session {
    /// Create an unauthenticated session.
    pub fn new(
        transport: Arc<dyn Transport>,
        token_url: impl Into<String>,
        app: Option<AppCredentials>,
        flow: AuthFlow,
    ) -> Self {
        Self {
            transport,
            token_url: token_url.into(),
            app,
            flow,
            credential: Mutex::new(None),
        }
    }

    /// Create a session seeded with a previously obtained credential.
    pub fn with_credential(
        transport: Arc<dyn Transport>,
        token_url: impl Into<String>,
        app: Option<AppCredentials>,
        flow: AuthFlow,
        credential: Credential,
    ) -> Self {
        let session = Self::new(transport, token_url, app, flow);
        Self {
            credential: Mutex::new(Some(credential)),
            ..session
        }
    }

    pub fn flow(&self) -> &AuthFlow {
        &self.flow
    }

    /// Snapshot of the current credential.
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.lock().await.clone()
    }

    pub async fn state(&self) -> SessionState {
        match self.credential.lock().await.as_ref() {
            None => SessionState::Unauthenticated,
            Some(c) if c.is_access_valid(Utc::now()) => SessionState::Authenticated,
            Some(_) => SessionState::Expired,
        }
    }

    /// Perform a full login for this session's flow.
    pub async fn login(&self) -> AuthResult<()> {
        let mut guard = self.credential.lock().await;
        *guard = Some(self.full_login().await?);
        Ok(())
    }

    /// Renew the credential if the access token has expired.
    ///
    /// Returns `true` when a refresh or login took place.
    pub async fn ensure_valid(&self) -> AuthResult<bool> {
        self.valid_access_token().await.map(|(_, renewed)| renewed)
    }

    /// `GET url` with the current access token attached, renewing it first
    /// if needed.
    pub async fn authenticated_request(&self, url: &str) -> AuthResult<Response> {
        let (token, _) = self.valid_access_token().await?;
        let request = Request::get(url).with_header("Authorization", format!("bearer {}", token));
        Ok(self.transport.send(request).await?)
    }

    async fn valid_access_token(&self) -> AuthResult<(String, bool)> {
        let mut guard = self.credential.lock().await;
        let now = Utc::now();

        let refresh_token = match guard.as_ref() {
            Some(credential) if credential.is_access_valid(now) => {
                return Ok((credential.access_token.clone(), false));
            }
            Some(credential) => credential.live_refresh_token(now).map(str::to_string),
            None => None,
        };

        let credential = match refresh_token {
            Some(refresh_token) => {
                debug!(flow = ?self.flow, "Access token expired, refreshing");
                let credential = self
                    .request_token(form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", &refresh_token),
                        ("token_type", "eg1"),
                    ]))
                    .await?;
                info!(expires_at = %credential.access_expiry, "Refreshed access token");
                credential
            }
            None => self.full_login().await?,
        };

        let token = credential.access_token.clone();
        *guard = Some(credential);
        Ok((token, true))
    }

    async fn full_login(&self) -> AuthResult<Credential> {
        let credential = self.request_token(self.flow.grant_form()).await?;
        info!(
            flow = ?self.flow,
            expires_at = %credential.access_expiry,
            refreshable = credential.refresh_token.is_some(),
            "Logged in"
        );
        Ok(credential)
    }

    async fn request_token(&self, form: Vec<(String, String)>) -> AuthResult<Credential> {
        let app = self.app.as_ref().ok_or(AuthError::MissingAppCredentials)?;
        let request =
            Request::post_form(&self.token_url, form).with_header("Authorization", app.basic_header());

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(AuthError::Rejected {
                status: response.status,
                body: response.text(),
            });
        }

        let token: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        Ok(token.into())
    }
}

fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
