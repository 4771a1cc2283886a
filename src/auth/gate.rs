//! Edge gate for protected routes.

use axum::{
    extract::{Request, State},
    http::Uri,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use super::{
    AuthState, cookies,
    redirect::{self, RedirectIntent},
    token,
};

pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &["/account", "/favorites"];
pub const DEFAULT_PROTECTED_ROUTES: &[&str] = &["/places/new", "/reviews/new"];

#[derive(Clone, Debug)]
pub struct GateConfig {
    protected_prefixes: Vec<String>,
    protected_routes: Vec<String>,
    login_route: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            protected_prefixes: to_owned(DEFAULT_PROTECTED_PREFIXES),
            protected_routes: to_owned(DEFAULT_PROTECTED_ROUTES),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
        }
    }

    #[must_use]
    pub fn with_protected_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.protected_prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn with_protected_routes(mut self, routes: Vec<String>) -> Self {
        self.protected_routes = routes;
        self
    }

    #[must_use]
    pub fn with_login_route(mut self, login_route: String) -> Self {
        self.login_route = login_route;
        self
    }

    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// A path is protected when it starts with a protected prefix or equals
    /// an exact protected route. The login route itself is never protected.
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        if path == self.login_route {
            return false;
        }
        self.protected_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .any(|prefix| path.starts_with(prefix.as_str()))
            || self.protected_routes.iter().any(|route| route == path)
    }
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Redirect(String),
}

/// Decide whether a request for `uri` may continue, given the access-token cookie.
#[must_use]
pub fn check(config: &GateConfig, uri: &Uri, access_token: Option<&str>) -> GateDecision {
    check_at(config, uri, access_token, token::now_unix())
}

/// [`check`] with an explicit clock.
#[must_use]
pub fn check_at(
    config: &GateConfig,
    uri: &Uri,
    access_token: Option<&str>,
    now: i64,
) -> GateDecision {
    if !config.is_protected(uri.path()) || token::is_valid_at(access_token, now) {
        return GateDecision::Proceed;
    }

    let intent = RedirectIntent::from_uri(uri);
    GateDecision::Redirect(redirect::login_location(&config.login_route, &intent))
}

/// Middleware: redirect unauthenticated requests for protected paths to login.
pub async fn gate(State(state): State<Arc<AuthState>>, request: Request, next: Next) -> Response {
    let access_token = cookies::find(request.headers(), state.cookies().access_name());

    match check(state.gate(), request.uri(), access_token.as_deref()) {
        GateDecision::Proceed => next.run(request).await,
        GateDecision::Redirect(location) => {
            debug!(path = %request.uri().path(), "redirecting to login");
            redirect::found(&location)
        }
    }
}
