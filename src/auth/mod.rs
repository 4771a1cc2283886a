//! Session gate, session refresh and the post-login handoff.
//!
//! ## Request pipeline
//!
//! Every request first passes the session refresher, which keeps the
//! provider session alive and rewrites the session cookies on both the
//! inbound request and the outbound response. The gate runs next and only
//! looks at the (possibly refreshed) access-token cookie: protected paths
//! without a locally valid token are redirected to the login route with a
//! `redirect` parameter describing where the user was going.
//!
//! ## Handoff
//!
//! After authenticating, the provider sends the browser back with session
//! material in the URL fragment or an authorization code in the query. The
//! handoff router normalizes those shapes into `GET /auth/callback`, which
//! exchanges the code and finishes on the original destination. Redirect
//! targets are always reduced to same-origin paths.

use std::sync::Arc;

use crate::identity::{IdentityProvider, User};

pub mod cookies;
pub mod gate;
pub mod handoff;
pub mod redirect;
pub mod refresh;
pub mod token;

pub use cookies::CookieConfig;
pub use gate::GateConfig;
pub use handoff::HandoffConfig;

/// The user resolved by the session refresher for the current request.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<User>);

/// Shared configuration and provider handle for the auth middleware and handlers.
#[derive(Clone)]
pub struct AuthState {
    provider: Arc<dyn IdentityProvider>,
    gate: GateConfig,
    cookies: CookieConfig,
    handoff: HandoffConfig,
}

impl AuthState {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            gate: GateConfig::new(),
            cookies: CookieConfig::new(),
            handoff: HandoffConfig::new(),
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: CookieConfig) -> Self {
        self.cookies = cookies;
        self
    }

    #[must_use]
    pub fn with_handoff(mut self, handoff: HandoffConfig) -> Self {
        self.handoff = handoff;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    #[must_use]
    pub fn provider_handle(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.provider)
    }

    #[must_use]
    pub fn gate(&self) -> &GateConfig {
        &self.gate
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieConfig {
        &self.cookies
    }

    #[must_use]
    pub fn handoff(&self) -> &HandoffConfig {
        &self.handoff
    }
}
