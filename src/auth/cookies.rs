//! Cookie parsing and `Set-Cookie` serialization for the session cookies.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};
use tracing::warn;

use crate::identity::Session;

pub const DEFAULT_ACCESS_COOKIE: &str = "sb-access-token";
pub const DEFAULT_REFRESH_COOKIE: &str = "sb-refresh-token";
pub const DEFAULT_CODE_VERIFIER_COOKIE: &str = "sb-code-verifier";

const DEFAULT_ACCESS_MAX_AGE_SECONDS: i64 = 60 * 60;
const DEFAULT_REFRESH_MAX_AGE_SECONDS: i64 = 400 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            max_age: None,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

/// A cookie the server wants the browser to store (or drop, with `Max-Age=0`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

impl SetCookie {
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.options.max_age == Some(0)
    }

    #[must_use]
    pub fn to_header_string(&self) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, self.value, self.options.path);
        if let Some(max_age) = self.options.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.options.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.options.same_site.as_str());
        if self.options.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// # Errors
    /// Returns an error if the cookie contains bytes not allowed in a header.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_header_string())
    }
}

/// Names and attributes of the session cookies.
#[derive(Clone, Debug)]
pub struct CookieConfig {
    access_name: String,
    refresh_name: String,
    code_verifier_name: String,
    secure: bool,
    refresh_max_age_seconds: i64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_name: DEFAULT_ACCESS_COOKIE.to_string(),
            refresh_name: DEFAULT_REFRESH_COOKIE.to_string(),
            code_verifier_name: DEFAULT_CODE_VERIFIER_COOKIE.to_string(),
            secure: true,
            refresh_max_age_seconds: DEFAULT_REFRESH_MAX_AGE_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_name(mut self, name: String) -> Self {
        self.access_name = name;
        self
    }

    #[must_use]
    pub fn with_refresh_name(mut self, name: String) -> Self {
        self.refresh_name = name;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn access_name(&self) -> &str {
        &self.access_name
    }

    #[must_use]
    pub fn refresh_name(&self) -> &str {
        &self.refresh_name
    }

    #[must_use]
    pub fn code_verifier_name(&self) -> &str {
        &self.code_verifier_name
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    fn options(&self, max_age: i64) -> CookieOptions {
        CookieOptions {
            max_age: Some(max_age),
            secure: self.secure,
            ..CookieOptions::default()
        }
    }

    /// Cookies that persist `session` in the browser.
    #[must_use]
    pub fn session_cookies(&self, session: &Session) -> Vec<SetCookie> {
        let access_max_age = session
            .expires_in
            .filter(|seconds| *seconds > 0)
            .unwrap_or(DEFAULT_ACCESS_MAX_AGE_SECONDS);
        vec![
            SetCookie {
                name: self.access_name.clone(),
                value: session.access_token.clone(),
                options: self.options(access_max_age),
            },
            SetCookie {
                name: self.refresh_name.clone(),
                value: session.refresh_token.clone(),
                options: self.options(self.refresh_max_age_seconds),
            },
        ]
    }

    /// Removal cookies for the session pair.
    #[must_use]
    pub fn clear_session_cookies(&self) -> Vec<SetCookie> {
        vec![
            self.removal(&self.access_name),
            self.removal(&self.refresh_name),
        ]
    }

    #[must_use]
    pub fn clear_code_verifier(&self) -> SetCookie {
        self.removal(&self.code_verifier_name)
    }

    fn removal(&self, name: &str) -> SetCookie {
        SetCookie {
            name: name.to_string(),
            value: String::new(),
            options: self.options(0),
        }
    }
}

/// Every cookie sent with the request, across all `Cookie` headers.
#[must_use]
pub fn parse_cookie_header(headers: &HeaderMap) -> Vec<Cookie> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Cookie::new(name, value.trim()))
        })
        .collect()
}

/// Value of the first cookie called `name`.
#[must_use]
pub fn find(headers: &HeaderMap, name: &str) -> Option<String> {
    parse_cookie_header(headers)
        .into_iter()
        .find(|cookie| cookie.name == name)
        .map(|cookie| cookie.value)
        .filter(|value| !value.is_empty())
}

/// Serialize cookies back into a single `Cookie` header value.
#[must_use]
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Names of the cookies a response already sets.
#[must_use]
pub fn set_cookie_names(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split_once('=').map(|(name, _)| name.trim().to_string()))
        .collect()
}

/// Append `Set-Cookie` headers; cookies that cannot be encoded are skipped.
pub fn append_set_cookies(headers: &mut HeaderMap, cookies: &[SetCookie]) {
    for cookie in cookies {
        match cookie.to_header_value() {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => warn!(cookie = %cookie.name, "Failed to encode Set-Cookie: {err}"),
        }
    }
}
