//! HTTP surface of the `sessiongate` binary.
//!
//! A small JSON API that logs users in, reports who the current cookie
//! belongs to and logs them out again, all through [`SessionAuth`].

use crate::session::{AuthError, PgSessionStore, SessionAuth};
use anyhow::Result;
use axum::{
    Extension, Json, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, debug_span, error, info};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use self::handlers::session::UserSession;
pub use self::openapi::openapi;

pub type Auth = Arc<SessionAuth<UserSession>>;

/// Where sessions live, as far as the health check is concerned.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Memory,
    Postgres(PgSessionStore),
}

impl StoreBackend {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres(_) => "postgres",
        }
    }

    /// `false` only when the database does not answer.
    pub async fn healthy(&self) -> bool {
        match self {
            Self::Memory => true,
            Self::Postgres(store) => match store.ping().await {
                Ok(()) => true,
                Err(err) => {
                    error!("Session store health check failed: {err}");
                    false
                }
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            err => {
                error!("Session error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Build the application router.
pub fn router(auth: Auth, backend: StoreBackend) -> Router {
    Router::new()
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/v1/sessions", post(handlers::login))
        .route("/v1/whoami", get(handlers::whoami))
        .route("/v1/logout", post(handlers::logout))
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth))
                .layer(Extension(backend)),
        )
}

/// Serve the API until Ctrl-C.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails
pub async fn new(port: u16, auth: Auth, backend: StoreBackend) -> Result<()> {
    let app = router(auth, backend);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let method = request.method().as_str();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    // Cookie headers carry session tokens and are left out on purpose.
    debug_span!("http-request", method, path, request_id)
}
