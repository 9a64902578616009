//! OAuth session and credential lifecycle.
//!
//! A [`Session`] owns one [`Credential`] and hands out authenticated requests.
//! Expired access tokens are renewed on use: with the refresh grant while the
//! refresh token is live, otherwise with a full login for the session's
//! [`AuthFlow`].
//!
//! ```text
//! Unauthenticated ──login──► Authenticated ──(access expired)──► Expired
//!                                  ▲                               │
//!                                  └──── refresh grant / login ────┘
//! ```

mod credential;
mod session;

use thiserror::Error;

use crate::transport::TransportError;

pub use credential::{AppCredentials, Credential};
pub use session::{AuthFlow, Session, SessionState};

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication failures.
///
/// All variants are fatal to the operation that needed authentication; the
/// caller has to prompt for new credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint refused the grant.
    #[error("token request rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The token endpoint answered with something that is not a token.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// No app credentials were configured for the Basic authorization header.
    #[error("no app credentials configured")]
    MissingAppCredentials,

    /// The token endpoint could not be reached.
    #[error("token request failed: {0}")]
    Transport(#[from] TransportError),
}
