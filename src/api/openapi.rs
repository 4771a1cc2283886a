#![allow(clippy::needless_for_each)]

use utoipa::OpenApi;

use super::handlers::{
    ErrorBody,
    callback::{__path_callback, __path_oauth_callback},
    health::{self, __path_health},
    session::{self, __path_current_user, __path_establish_session, __path_sign_out},
};
use crate::identity::User;

#[derive(OpenApi)]
#[openapi(
    paths(health, callback, oauth_callback, current_user, establish_session, sign_out),
    components(schemas(health::Health, session::SessionRequest, User, ErrorBody)),
    tags(
        (name = "auth", description = "Session handoff and cookies"),
        (name = "health", description = "Liveness")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc
}
