//! # Error Handling
//!
//! One error type for the whole service. Every ceremony call ends in either a
//! result or exactly one of these variants; nothing is retried internally,
//! because a spent challenge cannot be reused and a fresh one needs a new
//! `start` from the client.
//!
//! ## HTTP mapping
//! - unknown user, no enrolled passkeys → 404
//! - internal failures → 500 with a generic message
//! - every other protocol violation → 400

use crate::webauthn::verifier::VerificationFailure;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-wide error type
///
/// The protocol variants are terminal outcomes of the call that raised them.
/// `Internal` is reserved for failures that indicate a bug or a broken
/// invariant rather than a misbehaving client.
#[derive(Error, Debug)]
pub enum AppError {
    /// No subject registered under the given username
    #[error("User '{0}' not found")]
    SubjectNotFound(String),

    /// Subject exists but has no passkeys, so authentication cannot succeed
    #[error("No passkeys registered for user '{0}'")]
    NoCredentialsEnrolled(String),

    /// The credential the client claims to have used is not enrolled for the subject
    #[error("Unknown credential {0}")]
    UnknownCredential(String),

    /// The credential id is already enrolled for a different subject
    #[error("Credential {0} is registered to another user")]
    DuplicateCredential(String),

    /// Ceremony never started, already finished, or superseded by a newer start
    #[error("Missing challenge: {0}")]
    ChallengeMissing(String),

    /// The response was signed over a different challenge than the live one
    #[error("Challenge mismatch: {0}")]
    ChallengeMismatch(String),

    /// The live challenge is older than the configured maximum age
    #[error("Challenge expired: {0}")]
    ChallengeExpired(String),

    /// Client data could not be parsed far enough to find the challenge
    #[error("Malformed response payload: {0}")]
    MalformedResponsePayload(String),

    /// The cryptographic verifier rejected the response
    #[error("Verification failed: {0}")]
    VerificationFailed(#[from] VerificationFailure),

    /// Signature counter did not advance past the stored value
    #[error("Signature counter replay suspected: presented {presented}, stored {stored}")]
    CounterReplaySuspected { stored: u32, presented: u32 },

    /// Invalid request parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convert AppError into an HTTP response
///
/// Verification details and counter values are logged but not returned, so
/// a probing client learns only that the ceremony failed.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::SubjectNotFound(_) | AppError::NoCredentialsEnrolled(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::VerificationFailed(reason) => {
                tracing::warn!("Verification failed: {}", reason);
                (StatusCode::BAD_REQUEST, "Authentication error".to_string())
            }
            AppError::CounterReplaySuspected { stored, presented } => {
                tracing::warn!(
                    stored,
                    presented,
                    "Signature counter did not increase, possible cloned authenticator"
                );
                (StatusCode::BAD_REQUEST, "Authentication error".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            _ => {
                tracing::debug!("Rejected request: {}", self);
                (StatusCode::BAD_REQUEST, self.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
