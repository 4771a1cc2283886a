//! Per-request session refresh.
//!
//! The provider session is revalidated on every request. When the access
//! token has expired (or the provider rejects it) and a refresh token is
//! present, a new pair is minted and written to both the inbound request,
//! so handlers see it in the same request, and the outbound response, so the
//! browser keeps it. Failures never block the request.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::COOKIE},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    AuthState, CurrentUser,
    cookies::{self, Cookie, CookieConfig, SetCookie},
    token,
};
use crate::identity::{IdentityProvider, ProviderError, User};

/// Request-scoped cookie jar handed to the session context.
///
/// Reads see the request cookies plus every change made through
/// [`CookieAdapter::set_all`]; the changes are kept so they can be replayed
/// onto the response.
#[derive(Clone, Debug, Default)]
pub struct CookieAdapter {
    cookies: Vec<Cookie>,
    pending: Vec<SetCookie>,
}

impl CookieAdapter {
    #[must_use]
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self {
            cookies,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|cookie| cookie.name == name)
            .map(|cookie| cookie.value.as_str())
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn get_all(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn set_all(&mut self, changes: Vec<SetCookie>) {
        for change in changes {
            self.cookies.retain(|cookie| cookie.name != change.name);
            if !change.is_removal() {
                self.cookies
                    .push(Cookie::new(change.name.clone(), change.value.clone()));
            }
            self.pending.retain(|pending| pending.name != change.name);
            self.pending.push(change);
        }
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn pending(&self) -> &[SetCookie] {
        &self.pending
    }
}

/// Provider session bound to one request's cookies.
pub struct SessionContext<'a> {
    provider: &'a dyn IdentityProvider,
    config: &'a CookieConfig,
    adapter: CookieAdapter,
}

impl<'a> SessionContext<'a> {
    #[must_use]
    pub fn new(
        provider: &'a dyn IdentityProvider,
        config: &'a CookieConfig,
        adapter: CookieAdapter,
    ) -> Self {
        Self {
            provider,
            config,
            adapter,
        }
    }

    #[must_use]
    pub fn adapter(&self) -> &CookieAdapter {
        &self.adapter
    }

    #[must_use]
    pub fn into_adapter(self) -> CookieAdapter {
        self.adapter
    }

    /// Resolve the current user, refreshing the session when needed.
    ///
    /// `Ok(None)` means there is no usable session. A refresh token the
    /// provider rejects clears both session cookies.
    ///
    /// # Errors
    /// Returns an error when the provider cannot be reached or answers with
    /// anything other than a rejection.
    pub async fn get_user(&mut self) -> Result<Option<User>, ProviderError> {
        let access = self.adapter.get(self.config.access_name()).map(String::from);
        let refresh = self.adapter.get(self.config.refresh_name()).map(String::from);

        if let Some(access) = access.as_deref().filter(|t| token::is_valid(Some(*t))) {
            match self.provider.get_user(access).await {
                Ok(user) => return Ok(Some(user)),
                Err(err) if err.is_rejection() => {
                    debug!("access token rejected by provider");
                }
                Err(err) => return Err(err),
            }
        }

        let Some(refresh) = refresh else {
            return Ok(None);
        };

        match self.provider.refresh_session(&refresh).await {
            Ok(session) => {
                debug!("session refreshed");
                self.adapter.set_all(self.config.session_cookies(&session));
                match session.user {
                    Some(user) => Ok(Some(user)),
                    None => self.provider.get_user(&session.access_token).await.map(Some),
                }
            }
            Err(err) if err.is_rejection() => {
                debug!("refresh token rejected, clearing session cookies");
                self.adapter.set_all(self.config.clear_session_cookies());
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Middleware: refresh the session and expose the user as [`CurrentUser`].
pub async fn refresh_session(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let adapter = CookieAdapter::new(cookies::parse_cookie_header(request.headers()));
    let mut context = SessionContext::new(state.provider(), state.cookies(), adapter);

    let user = match context.get_user().await {
        Ok(user) => user,
        Err(err) => {
            warn!("Failed to resolve session: {err}");
            None
        }
    };
    let adapter = context.into_adapter();

    if adapter.has_changes() {
        let headers = request.headers_mut();
        headers.remove(COOKIE);
        let header = cookies::cookie_header(adapter.get_all());
        if !header.is_empty() {
            match HeaderValue::from_str(&header) {
                Ok(value) => {
                    headers.insert(COOKIE, value);
                }
                Err(err) => warn!("Failed to rewrite Cookie header: {err}"),
            }
        }
    }
    request.extensions_mut().insert(CurrentUser(user));

    let mut response = next.run(request).await;

    // cookies set by the handler itself (sign-out, session exchange) win
    let handled = cookies::set_cookie_names(response.headers());
    let pending: Vec<SetCookie> = adapter
        .pending()
        .iter()
        .filter(|cookie| !handled.contains(&cookie.name))
        .cloned()
        .collect();
    cookies::append_set_cookies(response.headers_mut(), &pending);
    response
}
