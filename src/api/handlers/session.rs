use axum::{
    extract::{Extension, Json},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::{ErrorBody, error_response};
use crate::{
    auth::{AuthState, CurrentUser, cookies},
    identity::User,
};

#[derive(ToSchema, Deserialize, Serialize)]
pub struct SessionRequest {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRequest").finish_non_exhaustive()
    }
}

#[utoipa::path(
    get,
    path= "/auth/user",
    responses (
        (status = 200, description = "Signed-in user", body = User),
        (status = 204, description = "No session")
    ),
    tag= "auth"
)]
pub async fn current_user(user: Option<Extension<CurrentUser>>) -> Response {
    match user.and_then(|Extension(CurrentUser(user))| user) {
        Some(user) => Json(user).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/auth/session",
    request_body = SessionRequest,
    responses (
        (status = 200, description = "Session established, cookies set", body = User),
        (status = 401, description = "Token pair rejected by the identity provider", body = ErrorBody),
        (status = 502, description = "Identity provider unavailable", body = ErrorBody)
    ),
    tag= "auth"
)]
pub async fn establish_session(
    state: Extension<Arc<AuthState>>,
    Json(request): Json<SessionRequest>,
) -> Response {
    let session = match state
        .provider()
        .set_session(&request.access_token, &request.refresh_token)
        .await
    {
        Ok(session) => session,
        Err(err) if err.is_rejection() => {
            debug!("token pair rejected: {err}");
            return error_response(StatusCode::UNAUTHORIZED, "invalid session");
        }
        Err(err) => {
            warn!("Failed to establish session: {err}");
            return error_response(StatusCode::BAD_GATEWAY, "identity provider unavailable");
        }
    };

    let user = match session.user.clone() {
        Some(user) => user,
        None => match state.provider().get_user(&session.access_token).await {
            Ok(user) => user,
            Err(err) => {
                warn!("Failed to load user for new session: {err}");
                return error_response(StatusCode::BAD_GATEWAY, "identity provider unavailable");
            }
        },
    };

    let mut response = Json(user).into_response();
    cookies::append_set_cookies(
        response.headers_mut(),
        &state.cookies().session_cookies(&session),
    );
    response
}

#[utoipa::path(
    post,
    path= "/auth/signout",
    responses (
        (status = 204, description = "Session cookies cleared")
    ),
    tag= "auth"
)]
pub async fn sign_out(state: Extension<Arc<AuthState>>, headers: HeaderMap) -> Response {
    if let Some(access_token) = cookies::find(&headers, state.cookies().access_name()) {
        if let Err(err) = state.provider().sign_out(&access_token).await {
            warn!("Provider sign-out failed: {err}");
        }
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    cookies::append_set_cookies(
        response.headers_mut(),
        &state.cookies().clear_session_cookies(),
    );
    response
}
