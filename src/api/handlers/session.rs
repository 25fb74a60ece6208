use crate::{api::Auth, session::AuthError};
use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// What the service stores for each session.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    session_id: Uuid,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct WhoAmI {
    session_id: Uuid,
    user_id: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

fn no_store() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}

#[utoipa::path(
    post,
    path= "/v1/sessions",
    request_body = LoginRequest,
    responses (
        (status = 201, description = "Session created, cookie set", body = LoginResponse),
        (status = 400, description = "Missing or invalid user_id", body = String),
        (status = 500, description = "Session store failure")
    ),
    tag = "session",
)]
/// Open a session for `user_id` and set the session cookie.
///
/// Credentials are not checked here; put this behind whatever proves the
/// caller is `user_id`.
#[instrument(skip(auth, payload))]
pub async fn login(
    Extension(auth): Extension<Auth>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let Ok(Json(request)) = payload else {
        debug!("Failed to parse login request");
        return Ok((StatusCode::BAD_REQUEST, "Invalid request body").into_response());
    };

    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "Missing user_id").into_response());
    }

    let mut headers = no_store();
    let session_id = auth
        .login(
            &UserSession {
                user_id: user_id.to_string(),
            },
            &mut headers,
        )
        .await?;

    Ok((StatusCode::CREATED, headers, Json(LoginResponse { session_id })).into_response())
}

#[utoipa::path(
    get,
    path= "/v1/whoami",
    responses (
        (status = 200, description = "Current session", body = WhoAmI),
        (status = 204, description = "No valid session (auto-error disabled)"),
        (status = 401, description = "No valid session"),
        (status = 500, description = "Session store failure")
    ),
    tag = "session",
)]
/// Describe the session the request cookie belongs to.
#[instrument(skip(auth, headers))]
pub async fn whoami(
    Extension(auth): Extension<Auth>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let Some(session) = auth.authenticate(&headers).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let whoami = WhoAmI {
        session_id: session.id,
        user_id: session.payload().user_id.clone(),
        created_at: session.record.created_at,
        expires_at: session.record.expires_at,
    };

    Ok((StatusCode::OK, no_store(), Json(whoami)).into_response())
}

#[utoipa::path(
    post,
    path= "/v1/logout",
    responses (
        (status = 204, description = "Session deleted and cookie cleared"),
        (status = 401, description = "No valid session"),
        (status = 500, description = "Session store failure")
    ),
    tag = "session",
)]
/// End the current session on the server and clear the cookie.
#[instrument(skip(auth, headers))]
pub async fn logout(
    Extension(auth): Extension<Auth>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let mut response_headers = HeaderMap::new();

    match auth.authenticate(&headers).await? {
        Some(session) => auth.logout(session.id, &mut response_headers).await?,
        // Nothing to delete; still drop whatever cookie the browser sent.
        None => auth.frontend().clear(&mut response_headers)?,
    }

    Ok((StatusCode::NO_CONTENT, response_headers).into_response())
}
