//! Redirect intents carried through the login detour.

use axum::{
    http::{StatusCode, Uri, header::LOCATION},
    response::{IntoResponse, Response},
};
use url::form_urlencoded;

/// Query parameter that carries the intended destination.
pub const REDIRECT_PARAM: &str = "redirect";
pub const DEFAULT_REDIRECT: &str = "/";

/// Where the user was trying to go before being sent to sign in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectIntent {
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl RedirectIntent {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: None,
            fragment: None,
        }
    }

    /// Empty queries are dropped so the location never ends in a bare `?`.
    #[must_use]
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query.filter(|q| !q.is_empty()).map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn with_fragment(mut self, fragment: Option<&str>) -> Self {
        self.fragment = fragment.filter(|f| !f.is_empty()).map(ToString::to_string);
        self
    }

    /// Intent for the request currently being handled.
    #[must_use]
    pub fn from_uri(uri: &Uri) -> Self {
        Self::new(uri.path()).with_query(uri.query())
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Render as `path[?query][#fragment]`, falling back to `/` when the
    /// result is not a path-relative location.
    #[must_use]
    pub fn to_location(&self) -> String {
        let mut location = self.path.clone();
        if let Some(query) = &self.query {
            location.push('?');
            location.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            location.push('#');
            location.push_str(fragment);
        }
        sanitize(Some(&location))
    }
}

/// Only same-origin, path-relative locations may be redirected to.
///
/// Rejects absolute URLs (`https://..`), protocol-relative URLs (`//host`),
/// the backslash variant browsers normalize to it (`/\host`) and anything
/// carrying control characters.
#[must_use]
pub fn is_path_relative(location: &str) -> bool {
    location.starts_with('/')
        && !location.starts_with("//")
        && !location.starts_with("/\\")
        && !location.chars().any(char::is_control)
}

/// Resolve an untrusted `redirect` value to a safe location.
#[must_use]
pub fn sanitize(location: Option<&str>) -> String {
    match location.map(str::trim) {
        Some(location) if is_path_relative(location) => location.to_string(),
        _ => DEFAULT_REDIRECT.to_string(),
    }
}

/// Login route with the intent attached as the single `redirect` parameter.
#[must_use]
pub fn login_location(login_route: &str, intent: &RedirectIntent) -> String {
    let encoded = form_urlencoded::Serializer::new(String::new())
        .append_pair(REDIRECT_PARAM, &intent.to_location())
        .finish();
    let separator = if login_route.contains('?') { '&' } else { '?' };
    format!("{login_route}{separator}{encoded}")
}

/// `302 Found` pointing at `location`.
#[must_use]
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect_param(location: &str) -> Option<String> {
        let (_, query) = location.split_once('?')?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == REDIRECT_PARAM)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn intent_from_uri_keeps_query() {
        let uri: Uri = "/account/billing?x=1".parse().unwrap_or_default();
        let intent = RedirectIntent::from_uri(&uri);
        assert_eq!(intent.path(), "/account/billing");
        assert_eq!(intent.query(), Some("x=1"));
        assert_eq!(intent.to_location(), "/account/billing?x=1");
    }

    #[test]
    fn intent_omits_question_mark_without_params() {
        let uri: Uri = "/favorites?".parse().unwrap_or_default();
        assert_eq!(RedirectIntent::from_uri(&uri).to_location(), "/favorites");
    }

    #[test]
    fn intent_renders_fragment() {
        let intent = RedirectIntent::new("/place/42")
            .with_query(Some("tab=reviews"))
            .with_fragment(Some("photos"));
        assert_eq!(intent.to_location(), "/place/42?tab=reviews#photos");
    }

    #[test]
    fn login_location_round_trips_intent() {
        let intent = RedirectIntent::new("/account/billing").with_query(Some("x=1"));
        let location = login_location("/login", &intent);
        assert!(location.starts_with("/login?redirect="));
        assert_eq!(
            redirect_param(&location).as_deref(),
            Some("/account/billing?x=1")
        );
    }

    #[test]
    fn login_location_appends_to_existing_query() {
        let intent = RedirectIntent::new("/favorites");
        let location = login_location("/login?mode=magic", &intent);
        assert_eq!(location, "/login?mode=magic&redirect=%2Ffavorites");
    }

    #[test]
    fn path_relative_accepts_local_paths() {
        assert!(is_path_relative("/"));
        assert!(is_path_relative("/place/42?tab=reviews#top"));
    }

    #[test]
    fn path_relative_rejects_external_targets() {
        assert!(!is_path_relative("https://evil.example/"));
        assert!(!is_path_relative("//evil.example/"));
        assert!(!is_path_relative("/\\evil.example/"));
        assert!(!is_path_relative("javascript:alert(1)"));
        assert!(!is_path_relative("place/42"));
        assert!(!is_path_relative(""));
        assert!(!is_path_relative("/place\n/42"));
    }

    #[test]
    fn sanitize_falls_back_to_root() {
        assert_eq!(sanitize(None), "/");
        assert_eq!(sanitize(Some("https://evil.example")), "/");
        assert_eq!(sanitize(Some("/place/42")), "/place/42");
    }

    #[test]
    fn found_sets_location() {
        let response = found("/place/42");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok()),
            Some("/place/42")
        );
    }
}
