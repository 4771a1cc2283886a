//! Post-authentication handoff.
//!
//! After sign-in the provider sends the browser back with session material in
//! one of three shapes. [`plan`] picks the single shape that applies and
//! [`HandoffRouter`] carries it out against a [`Navigator`]:
//!
//! 1. a recovery fragment (`#...&type=recovery`) goes to the reset-password
//!    page with the fragment untouched;
//! 2. a session fragment (`#access_token=..&refresh_token=..`) establishes the
//!    session in place and strips the fragment;
//! 3. a `code` query parameter is forwarded to the server callback together
//!    with the rest of the URL as the `redirect` target.
//!
//! Navigation always replaces the current history entry so "back" never
//! returns to a URL carrying credentials.

use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::{Url, form_urlencoded};

use super::redirect::{self, REDIRECT_PARAM};
use crate::identity::{IdentityProvider, Session};

pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_RESET_PASSWORD_ROUTE: &str = "/auth/reset-password";
pub const DEFAULT_CALLBACK_ROUTE: &str = "/auth/callback";
pub const DEFAULT_OAUTH_CALLBACK_ROUTE: &str = "/auth/oauth/callback";

const CODE_PARAM: &str = "code";
const RECOVERY_TYPE: &str = "recovery";
const EVENT_CAPACITY: usize = 16;

#[derive(Clone, Debug)]
pub struct HandoffConfig {
    app_origin: String,
    reset_password_route: String,
    callback_route: String,
    oauth_callback_route: String,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HandoffConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            reset_password_route: DEFAULT_RESET_PASSWORD_ROUTE.to_string(),
            callback_route: DEFAULT_CALLBACK_ROUTE.to_string(),
            oauth_callback_route: DEFAULT_OAUTH_CALLBACK_ROUTE.to_string(),
        }
    }

    #[must_use]
    pub fn with_app_origin(mut self, app_origin: String) -> Self {
        self.app_origin = app_origin.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_reset_password_route(mut self, route: String) -> Self {
        self.reset_password_route = route;
        self
    }

    #[must_use]
    pub fn with_callback_route(mut self, route: String) -> Self {
        self.callback_route = route;
        self
    }

    #[must_use]
    pub fn with_oauth_callback_route(mut self, route: String) -> Self {
        self.oauth_callback_route = route;
        self
    }

    #[must_use]
    pub fn app_origin(&self) -> &str {
        &self.app_origin
    }

    #[must_use]
    pub fn reset_password_route(&self) -> &str {
        &self.reset_password_route
    }

    #[must_use]
    pub fn callback_route(&self) -> &str {
        &self.callback_route
    }

    #[must_use]
    pub fn oauth_callback_route(&self) -> &str {
        &self.oauth_callback_route
    }
}

/// What a page load should do with the URL it arrived on.
#[derive(Clone, PartialEq, Eq)]
pub enum HandoffAction {
    /// Go to the reset-password page, fragment carried verbatim.
    Recovery { location: String },
    /// Establish a session from the fragment pair, then show `cleaned`.
    EstablishSession {
        access_token: String,
        refresh_token: String,
        cleaned: String,
    },
    /// Forward the authorization code to the server callback.
    ExchangeCode { location: String },
    None,
}

impl fmt::Debug for HandoffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recovery { .. } => f.write_str("Recovery"),
            Self::EstablishSession { cleaned, .. } => f
                .debug_struct("EstablishSession")
                .field("cleaned", cleaned)
                .finish_non_exhaustive(),
            Self::ExchangeCode { .. } => f.write_str("ExchangeCode"),
            Self::None => f.write_str("None"),
        }
    }
}

/// Decide which transport shape `url` carries. First match wins.
#[must_use]
pub fn plan(config: &HandoffConfig, url: &Url) -> HandoffAction {
    if let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
        let params: Vec<(String, String)> = form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect();
        let param = |key: &str| {
            params
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str())
        };

        if param("type") == Some(RECOVERY_TYPE) {
            return HandoffAction::Recovery {
                location: format!("{}#{fragment}", config.reset_password_route),
            };
        }

        if let (Some(access_token), Some(refresh_token), None) =
            (param("access_token"), param("refresh_token"), param("type"))
        {
            return HandoffAction::EstablishSession {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                cleaned: path_and_query(url),
            };
        }
    }

    let code = url
        .query_pairs()
        .find(|(key, _)| key == CODE_PARAM)
        .map(|(_, value)| value.into_owned());

    match code {
        Some(code) => {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .append_pair(CODE_PARAM, &code)
                .append_pair(REDIRECT_PARAM, &intended_location(url))
                .finish();
            HandoffAction::ExchangeCode {
                location: format!("{}?{encoded}", config.callback_route),
            }
        }
        None => HandoffAction::None,
    }
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{query}", url.path()),
        _ => url.path().to_string(),
    }
}

/// Path, query without `code`, and fragment of `url`.
fn intended_location(url: &Url) -> String {
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| key != CODE_PARAM)
        .collect();

    let mut location = url.path().to_string();
    if !remaining.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&remaining)
            .finish();
        location.push('?');
        location.push_str(&query);
    }
    if let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
        location.push('#');
        location.push_str(fragment);
    }
    redirect::sanitize(Some(&location))
}

/// Browser-side navigation primitives the handoff needs.
pub trait Navigator {
    fn current_url(&self) -> Url;

    /// Navigate to `location`, replacing the current history entry.
    fn replace(&mut self, location: &str);

    /// Rewrite the address bar to `location` without reloading.
    fn replace_state(&mut self, location: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffEvent {
    SessionEstablished { user_id: Option<String> },
    SessionFailed { reason: String },
}

#[derive(Debug, PartialEq, Eq)]
pub enum HandoffOutcome {
    Navigated(String),
    SessionEstablished(Session),
    SessionFailed,
    Idle,
}

pub struct HandoffRouter {
    config: HandoffConfig,
    provider: Arc<dyn IdentityProvider>,
    events: broadcast::Sender<HandoffEvent>,
}

impl HandoffRouter {
    #[must_use]
    pub fn new(config: HandoffConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            provider,
            events,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HandoffEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: HandoffEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Act on the URL the page was loaded with.
    pub async fn run<N: Navigator + Send>(&self, navigator: &mut N) -> HandoffOutcome {
        match plan(&self.config, &navigator.current_url()) {
            HandoffAction::Recovery { location } | HandoffAction::ExchangeCode { location } => {
                debug!("handoff forwarding");
                navigator.replace(&location);
                HandoffOutcome::Navigated(location)
            }
            HandoffAction::EstablishSession {
                access_token,
                refresh_token,
                cleaned,
            } => match self.provider.set_session(&access_token, &refresh_token).await {
                Ok(session) => {
                    let user_id = session.user.as_ref().map(|user| user.id.clone());
                    info!(user_id = user_id.as_deref().unwrap_or_default(), "session established");
                    navigator.replace_state(&cleaned);
                    self.publish(HandoffEvent::SessionEstablished { user_id });
                    HandoffOutcome::SessionEstablished(session)
                }
                Err(err) => {
                    warn!("Failed to establish session from fragment: {err}");
                    self.publish(HandoffEvent::SessionFailed {
                        reason: err.to_string(),
                    });
                    HandoffOutcome::SessionFailed
                }
            },
            HandoffAction::None => HandoffOutcome::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeProvider, token_expiring_in, user};

    struct FakeNavigator {
        url: Url,
        replaced: Vec<String>,
        replaced_state: Vec<String>,
    }

    impl FakeNavigator {
        fn at(url: &str) -> Self {
            Self {
                url: Url::parse(url).unwrap_or_else(|_| panic!("bad test url {url}")),
                replaced: Vec::new(),
                replaced_state: Vec::new(),
            }
        }

        fn navigate(&mut self, location: &str) {
            if let Ok(url) = self.url.join(location) {
                self.url = url;
            }
        }
    }

    impl Navigator for FakeNavigator {
        fn current_url(&self) -> Url {
            self.url.clone()
        }

        fn replace(&mut self, location: &str) {
            self.replaced.push(location.to_string());
            self.navigate(location);
        }

        fn replace_state(&mut self, location: &str) {
            self.replaced_state.push(location.to_string());
            self.navigate(location);
        }
    }

    fn plan_for(url: &str) -> HandoffAction {
        plan(
            &HandoffConfig::new(),
            &Url::parse(url).unwrap_or_else(|_| panic!("bad test url {url}")),
        )
    }

    fn query_param(location: &str, key: &str) -> Option<String> {
        let (_, query) = location.split_once('?')?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn recovery_fragment_wins_over_code() {
        let action = plan_for("https://places.test/login?code=abc123#access_token=a&type=recovery");
        assert_eq!(
            action,
            HandoffAction::Recovery {
                location: "/auth/reset-password#access_token=a&type=recovery".to_string()
            }
        );
    }

    #[test]
    fn session_fragment_establishes_in_place() {
        let action =
            plan_for("https://places.test/place/42?tab=reviews#access_token=a&refresh_token=r&expires_in=3600");
        assert_eq!(
            action,
            HandoffAction::EstablishSession {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                cleaned: "/place/42?tab=reviews".to_string(),
            }
        );
    }

    #[test]
    fn session_fragment_with_other_type_is_not_established() {
        let action = plan_for("https://places.test/#access_token=a&refresh_token=r&type=signup");
        assert_eq!(action, HandoffAction::None);
    }

    #[test]
    fn code_only_forwards_to_callback_with_path() {
        let HandoffAction::ExchangeCode { location } = plan_for("https://places.test/place/42?code=abc123")
        else {
            panic!("expected code exchange");
        };
        assert!(location.starts_with("/auth/callback?"));
        assert_eq!(query_param(&location, "code").as_deref(), Some("abc123"));
        assert_eq!(query_param(&location, "redirect").as_deref(), Some("/place/42"));
    }

    #[test]
    fn code_redirect_keeps_other_query_parameters() {
        let HandoffAction::ExchangeCode { location } =
            plan_for("https://places.test/search?q=tacos&code=abc123&page=2")
        else {
            panic!("expected code exchange");
        };
        assert_eq!(
            query_param(&location, "redirect").as_deref(),
            Some("/search?q=tacos&page=2")
        );
    }

    #[test]
    fn code_on_root_defaults_redirect_to_root() {
        let HandoffAction::ExchangeCode { location } = plan_for("https://places.test/?code=abc123")
        else {
            panic!("expected code exchange");
        };
        assert_eq!(query_param(&location, "redirect").as_deref(), Some("/"));
    }

    #[test]
    fn action_debug_hides_tokens() {
        let rendered = format!("{:?}", plan_for("https://places.test/#access_token=secret-a&refresh_token=secret-r"));
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn envelope_free_url_is_idle_every_time() {
        let router = HandoffRouter::new(HandoffConfig::new(), Arc::new(FakeProvider::new()));
        let mut navigator = FakeNavigator::at("https://places.test/place/42?tab=photos");

        assert_eq!(router.run(&mut navigator).await, HandoffOutcome::Idle);
        assert_eq!(router.run(&mut navigator).await, HandoffOutcome::Idle);
        assert!(navigator.replaced.is_empty());
        assert!(navigator.replaced_state.is_empty());
    }

    #[tokio::test]
    async fn recovery_replaces_page() {
        let router = HandoffRouter::new(HandoffConfig::new(), Arc::new(FakeProvider::new()));
        let mut navigator =
            FakeNavigator::at("https://places.test/?code=abc123#access_token=a&type=recovery");

        let outcome = router.run(&mut navigator).await;
        assert_eq!(
            outcome,
            HandoffOutcome::Navigated("/auth/reset-password#access_token=a&type=recovery".to_string())
        );
        assert_eq!(navigator.replaced.len(), 1);
        assert!(navigator.replaced_state.is_empty());
    }

    #[tokio::test]
    async fn session_fragment_strips_fragment_and_publishes() {
        let access = token_expiring_in(600);
        let provider = FakeProvider::new().with_user(&access, user("u1"));
        let router = HandoffRouter::new(HandoffConfig::new(), Arc::new(provider));
        let mut events = router.subscribe();
        let mut navigator =
            FakeNavigator::at(&format!("https://places.test/account#access_token={access}&refresh_token=r1"));

        let outcome = router.run(&mut navigator).await;
        assert!(matches!(outcome, HandoffOutcome::SessionEstablished(_)));
        assert_eq!(navigator.replaced_state, vec!["/account".to_string()]);
        assert!(navigator.replaced.is_empty());
        assert_eq!(navigator.current_url().fragment(), None);
        assert_eq!(
            events.try_recv().ok(),
            Some(HandoffEvent::SessionEstablished {
                user_id: Some("u1".to_string())
            })
        );

        // the fragment is gone, so a second run has nothing to do
        assert_eq!(router.run(&mut navigator).await, HandoffOutcome::Idle);
    }

    #[tokio::test]
    async fn failed_session_stays_put_and_reports() {
        let router = HandoffRouter::new(HandoffConfig::new(), Arc::new(FakeProvider::new()));
        let mut events = router.subscribe();
        let mut navigator = FakeNavigator::at("https://places.test/account#access_token=bad&refresh_token=bad");

        assert_eq!(router.run(&mut navigator).await, HandoffOutcome::SessionFailed);
        assert!(navigator.replaced.is_empty());
        assert!(navigator.replaced_state.is_empty());
        assert!(matches!(
            events.try_recv().ok(),
            Some(HandoffEvent::SessionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_does_not_fail() {
        let router = HandoffRouter::new(HandoffConfig::new(), Arc::new(FakeProvider::new()));
        let mut navigator = FakeNavigator::at("https://places.test/#access_token=bad&refresh_token=bad");
        assert_eq!(router.run(&mut navigator).await, HandoffOutcome::SessionFailed);
    }
}
