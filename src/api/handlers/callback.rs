//! Server side of the handoff: exchange the authorization code and send the
//! browser on to where it was going.

use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::IntoParams;

use crate::auth::{AuthState, cookies, redirect};

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Authorization code issued by the identity provider.
    pub code: Option<String>,
    /// Path-relative destination; anything else falls back to `/`.
    pub redirect: Option<String>,
}

#[utoipa::path(
    get,
    path= "/auth/callback",
    params(CallbackQuery),
    responses (
        (status = 302, description = "Redirect to the sanitized `redirect` target, with session cookies when the code was exchanged")
    ),
    tag= "auth"
)]
pub async fn callback(
    state: Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let location = redirect::sanitize(query.redirect.as_deref());
    finish(&state, &headers, query.code.as_deref(), &location).await
}

#[utoipa::path(
    get,
    path= "/auth/oauth/callback",
    params(CallbackQuery),
    responses (
        (status = 302, description = "Redirect to the sanitized `redirect` target on the configured app origin")
    ),
    tag= "auth"
)]
pub async fn oauth_callback(
    state: Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let location = format!(
        "{}{}",
        state.handoff().app_origin(),
        redirect::sanitize(query.redirect.as_deref())
    );
    finish(&state, &headers, query.code.as_deref(), &location).await
}

async fn finish(state: &AuthState, headers: &HeaderMap, code: Option<&str>, location: &str) -> Response {
    let mut response = redirect::found(location);

    let Some(code) = code else {
        debug!("callback without code");
        return response;
    };

    let code_verifier = cookies::find(headers, state.cookies().code_verifier_name());
    match state
        .provider()
        .exchange_code(code, code_verifier.as_deref())
        .await
    {
        Ok(session) => {
            debug!(user = ?session.user.as_ref().map(|u| &u.id), "code exchanged");
            let mut set = state.cookies().session_cookies(&session);
            if code_verifier.is_some() {
                set.push(state.cookies().clear_code_verifier());
            }
            cookies::append_set_cookies(response.headers_mut(), &set);
        }
        Err(err) => warn!("Failed to exchange authorization code: {err}"),
    }

    response
}
