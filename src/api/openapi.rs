#![allow(clippy::needless_for_each)]

use crate::api::handlers::{health, session};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(health::health, session::login, session::whoami, session::logout),
    components(
        schemas(
            health::Health,
            session::LoginRequest,
            session::LoginResponse,
            session::WhoAmI
        )
    ),
    tags(
        (name = "health", description = "Service status"),
        (name = "session", description = "Cookie session lifecycle"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
