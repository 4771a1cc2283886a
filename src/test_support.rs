//! Shared fixtures for unit tests: token minting and an in-memory provider.

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::auth::token::now_unix;
use crate::identity::{IdentityProvider, ProviderError, Session, User};

/// Unsigned JWT-shaped token carrying `claims`.
pub fn mint_token(claims: &Value) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = Base64UrlUnpadded::encode_string(claims.to_string().as_bytes());
    format!("{header}.{payload}.signature")
}

/// Token for `user-1` expiring `seconds` from now (negative for the past).
pub fn token_expiring_in(seconds: i64) -> String {
    mint_token(&json!({ "sub": "user-1", "exp": now_unix() + seconds }))
}

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: Some(format!("{id}@example.com")),
        role: Some("authenticated".to_string()),
    }
}

fn rejected(message: &str) -> ProviderError {
    ProviderError::Status {
        status: 401,
        message: message.to_string(),
    }
}

/// In-memory provider keyed by token values.
#[derive(Default)]
pub struct FakeProvider {
    users: HashMap<String, User>,
    refreshes: HashMap<String, (String, String)>,
    codes: HashMap<String, (String, String)>,
    unavailable: bool,
    refresh_calls: AtomicUsize,
    signed_out: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// `access_token` resolves to `user`.
    pub fn with_user(mut self, access_token: &str, user: User) -> Self {
        self.users.insert(access_token.to_string(), user);
        self
    }

    /// `refresh_token` mints the pair (`access_token`, `next_refresh`).
    pub fn with_refresh(mut self, refresh_token: &str, access_token: &str, next_refresh: &str) -> Self {
        self.refreshes.insert(
            refresh_token.to_string(),
            (access_token.to_string(), next_refresh.to_string()),
        );
        self
    }

    /// `code` exchanges for the pair (`access_token`, `refresh_token`).
    pub fn with_code(mut self, code: &str, access_token: &str, refresh_token: &str) -> Self {
        self.codes.insert(
            code.to_string(),
            (access_token.to_string(), refresh_token.to_string()),
        );
        self
    }

    /// Every call fails as if the provider were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn signed_out(&self) -> Vec<String> {
        self.signed_out
            .lock()
            .map(|tokens| tokens.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        if self.unavailable {
            return Err(ProviderError::Status {
                status: 503,
                message: "provider unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn session(&self, access_token: &str, refresh_token: &str) -> Session {
        Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in: Some(3600),
            expires_at: None,
            user: self.users.get(access_token).cloned(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_user(&self, access_token: &str) -> Result<User, ProviderError> {
        self.check_available()?;
        self.users
            .get(access_token)
            .cloned()
            .ok_or_else(|| rejected("invalid JWT"))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let (access, next) = self
            .refreshes
            .get(refresh_token)
            .ok_or_else(|| rejected("Invalid Refresh Token"))?;
        Ok(self.session(access, next))
    }

    async fn exchange_code(
        &self,
        code: &str,
        _code_verifier: Option<&str>,
    ) -> Result<Session, ProviderError> {
        self.check_available()?;
        let (access, refresh) = self
            .codes
            .get(code)
            .ok_or_else(|| rejected("invalid flow state"))?;
        Ok(self.session(access, refresh))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        self.check_available()?;
        if let Ok(mut tokens) = self.signed_out.lock() {
            tokens.push(access_token.to_string());
        }
        Ok(())
    }
}
