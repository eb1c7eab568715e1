//! # WebAuthn Module
//!
//! Ceremony orchestration for passwordless authentication.
//!
//! ## Submodules
//! - `registration`: enrolling new passkeys
//! - `authentication`: signing in with an enrolled passkey
//! - `response`: parsing the browser's credential JSON
//! - `verifier`: the cryptographic verification seam and its implementation
//! - `authenticator_data`, `cose`: binary formats the verifier decodes
//! - `types`: request/response types for the HTTP API
//!
//! ## WebAuthn Flow Overview
//!
//! ### Registration (Creating a Passkey)
//! 1. Client requests registration → `registration::start_registration()`
//! 2. Server creates the subject if needed and issues a registration challenge
//! 3. Client creates a credential with its authenticator
//! 4. Client sends the credential back → `registration::finish_registration()`
//! 5. Server consumes the challenge, verifies, and stores the public key
//!
//! ### Authentication (Logging In)
//! 1. Client requests authentication → `authentication::start_authentication()`
//! 2. Server issues a challenge together with the allowed credentials
//! 3. Client signs the challenge with its authenticator
//! 4. Client sends the assertion back → `authentication::finish_authentication()`
//! 5. Server consumes the challenge, verifies the signature with the stored
//!    key, and only accepts a signature counter larger than the stored one
//!
//! Each ceremony instance moves `Idle → ChallengeIssued → Consumed` exactly
//! once. A failed finish leaves no partial state behind, and the spent
//! challenge cannot be retried: the client must start a new ceremony.

pub mod authentication;
pub mod authenticator_data;
pub mod cose;
pub mod registration;
pub mod response;
pub mod types;
pub mod verifier;

use crate::error::{AppError, AppResult};
use crate::store::models::CredentialId;

/// Confirmation returned by both finish operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonyOutcome {
    pub username: String,
    pub credential_id: CredentialId,
    /// Signature counter now stored for the credential
    pub counter: u32,
}

fn validate_username(username: &str) -> AppResult<&str> {
    if username.trim().is_empty() {
        return Err(AppError::BadRequest("username must not be blank".to_string()));
    }
    Ok(username)
}
