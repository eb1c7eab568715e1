//! # HTTP Request Handlers
//!
//! Thin adapters between HTTP and the ceremony orchestrator. Each handler
//! extracts the JSON body, calls into `webauthn::registration` or
//! `webauthn::authentication`, and serializes the result.
//!
//! ## Submodules
//! - `health`: Health check endpoint (for monitoring)
//! - `auth`: Registration and authentication ceremony endpoints
//!
//! ## Routes
//! - `GET  /health`
//! - `POST /api/auth/register/start`
//! - `POST /api/auth/register/finish`
//! - `POST /api/auth/authenticate/start`
//! - `POST /api/auth/authenticate/finish`
//!
//! Anything else falls through to the static frontend in `static/`.

pub mod auth;
pub mod health;

use crate::state::AppState;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the application router
///
/// Layers are applied in reverse order: tracing sees every request first.
///
/// Cross-origin calls are only allowed from the relying party origin, the
/// only origin whose ceremonies can verify anyway.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(&state.relying_party.origin))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/register/start", post(auth::register_start))
        .route("/api/auth/register/finish", post(auth::register_finish))
        .route("/api/auth/authenticate/start", post(auth::authenticate_start))
        .route("/api/auth/authenticate/finish", post(auth::authenticate_finish))
        .fallback_service(ServeDir::new("static"))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allowed_origin(origin: &str) -> AllowOrigin {
    match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::list([value]),
        Err(e) => {
            tracing::warn!("RP origin {origin} is not a valid header value: {e}");
            AllowOrigin::list([])
        }
    }
}
