use crate::error::AppResult;
use crate::state::AppState;
use crate::webauthn::types::*;
use crate::webauthn::{authentication, registration};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Challenge-bearing options must never be cached by the browser or a proxy.
const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

// Registration endpoints

pub async fn register_start(
    State(state): State<AppState>,
    Json(req): Json<RegistrationStartRequest>,
) -> AppResult<impl IntoResponse> {
    let challenge =
        registration::start_registration(&state, &req.username, req.display_name.as_deref())?;
    let options: PublicKeyOptions<CreationOptions> = challenge.into();

    Ok((NO_STORE, Json(options)))
}

pub async fn register_finish(
    State(state): State<AppState>,
    Json(req): Json<RegistrationFinishRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = registration::finish_registration(&state, &req.username, &req.credential)?;

    Ok((StatusCode::CREATED, Json(CeremonyResponse::from(outcome))))
}

// Authentication endpoints

pub async fn authenticate_start(
    State(state): State<AppState>,
    Json(req): Json<AuthenticationStartRequest>,
) -> AppResult<impl IntoResponse> {
    let challenge = authentication::start_authentication(&state, &req.username)?;
    let options: PublicKeyOptions<RequestOptions> = challenge.into();

    Ok((NO_STORE, Json(options)))
}

pub async fn authenticate_finish(
    State(state): State<AppState>,
    Json(req): Json<AuthenticationFinishRequest>,
) -> AppResult<Json<CeremonyResponse>> {
    let outcome = authentication::finish_authentication(&state, &req.username, &req.credential)?;

    Ok(Json(CeremonyResponse::from(outcome)))
}
