//! Identity provider seam.
//!
//! Sessions, refresh and OAuth code exchange are owned by a managed identity
//! provider. Everything in this crate talks to it through [`IdentityProvider`]
//! so handlers and middleware can be driven by a fake in tests; the server
//! wires in [`GoTrueClient`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

use crate::auth::token;

pub mod gotrue;

pub use gotrue::GoTrueClient;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity provider returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("identity provider response did not include a user")]
    MissingUser,
}

impl ProviderError {
    /// The provider rejected the credentials (as opposed to being unreachable).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }
}

#[derive(ToSchema, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    /// Session built from a caller-supplied token pair.
    #[must_use]
    pub fn from_pair(access_token: &str, refresh_token: &str, user: User) -> Self {
        let expires_at = token::expires_at(access_token);
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in: expires_at.map(|exp| exp - token::now_unix()),
            expires_at,
            user: Some(user),
        }
    }
}

// Tokens never reach the logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user an access token belongs to.
    async fn get_user(&self, access_token: &str) -> Result<User, ProviderError>;

    /// Mint a new session from a refresh token.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, ProviderError>;

    /// Exchange an authorization code returned by an OAuth / magic-link flow.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, ProviderError>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    /// Establish a session from a token pair delivered in a URL fragment.
    ///
    /// A locally live access token is confirmed with the provider; an expired
    /// one is replaced through the refresh token.
    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ProviderError> {
        if token::is_valid(Some(access_token)) {
            let user = self.get_user(access_token).await?;
            return Ok(Session::from_pair(access_token, refresh_token, user));
        }
        self.refresh_session(refresh_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeProvider, token_expiring_in, user};

    #[test]
    fn session_debug_redacts_tokens() {
        let session = Session::from_pair("secret-access", "secret-refresh", user("u1"));
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("u1"));
    }

    #[test]
    fn rejection_is_client_error_status() {
        let rejected = ProviderError::Status {
            status: 401,
            message: "invalid JWT".to_string(),
        };
        let unavailable = ProviderError::Status {
            status: 503,
            message: "down".to_string(),
        };
        assert!(rejected.is_rejection());
        assert!(!unavailable.is_rejection());
        assert!(!ProviderError::MissingUser.is_rejection());
    }

    #[tokio::test]
    async fn set_session_confirms_live_token() {
        let access = token_expiring_in(600);
        let provider = FakeProvider::new().with_user(&access, user("u1"));

        let session = provider.set_session(&access, "refresh-1").await;
        let session = session.ok();
        assert_eq!(
            session.as_ref().and_then(|s| s.user.clone()),
            Some(user("u1"))
        );
        assert_eq!(
            session.map(|s| s.refresh_token),
            Some("refresh-1".to_string())
        );
        assert_eq!(provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn set_session_refreshes_expired_token() {
        let stale = token_expiring_in(-60);
        let fresh = token_expiring_in(3600);
        let provider = FakeProvider::new()
            .with_user(&fresh, user("u1"))
            .with_refresh("refresh-1", &fresh, "refresh-2");

        let session = provider.set_session(&stale, "refresh-1").await.ok();
        assert_eq!(
            session.map(|s| s.refresh_token),
            Some("refresh-2".to_string())
        );
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn set_session_propagates_rejection() {
        let access = token_expiring_in(600);
        let provider = FakeProvider::new();
        let result = provider.set_session(&access, "refresh-1").await;
        assert!(result.is_err_and(|err| err.is_rejection()));
    }
}
