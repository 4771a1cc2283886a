//! # placegate
//!
//! Session gate and authentication handoff for a place-review web app.
//!
//! Write paths (`/account`, `/favorites`, `/places/new`, ...) are protected by
//! an edge gate that inspects the access-token cookie locally (expiry only, no
//! signature check) and sends anonymous visitors to the login route with a
//! `redirect` parameter describing where they were going. A per-request
//! session refresher keeps the identity provider session alive, and the
//! handoff router plus `GET /auth/callback` bring the user back to that
//! destination once the provider has authenticated them.
//!
//! Redirect targets are always reduced to same-origin paths.

pub mod api;
pub mod auth;
pub mod cli;
pub mod identity;

#[cfg(test)]
mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
