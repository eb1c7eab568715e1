//! # WebAuthn API Types
//!
//! Request/response types for the HTTP endpoints, and the JSON shape of the
//! options handed to `navigator.credentials.create()` / `.get()`.
//!
//! ## API Flow
//! Each WebAuthn operation has two steps: start and finish
//! - Start: server creates a challenge, client receives the options
//! - Finish: client sends the credential, server verifies it

use crate::config::UserVerification;
use crate::store::models::{CredentialDescriptor, CredentialType};
use crate::webauthn::authentication::AuthenticationChallenge;
use crate::webauthn::cose::SUPPORTED_ALGORITHMS;
use crate::webauthn::registration::RegistrationChallenge;
use crate::webauthn::CeremonyOutcome;
use serde::{Deserialize, Serialize};

/// Request to start passkey registration
///
/// ## Example JSON
/// ```json
/// {
///   "username": "alice",
///   "display_name": "Alice Smith"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationStartRequest {
    /// Unique username (used for login)
    pub username: String,
    /// Shown during passkey creation; defaults to the username
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Request to complete passkey registration
///
/// ## Why serde_json::Value?
/// The credential is the browser's `PublicKeyCredential` serialized as JSON.
/// It is parsed by `webauthn::response` so that a malformed payload maps to
/// a ceremony error instead of a generic JSON rejection.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationFinishRequest {
    pub username: String,
    pub credential: serde_json::Value,
}

/// Request to start passkey authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticationStartRequest {
    pub username: String,
}

/// Request to complete passkey authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticationFinishRequest {
    pub username: String,
    /// The assertion (signed challenge) from the WebAuthn API
    pub credential: serde_json::Value,
}

/// Result of a finished ceremony
///
/// ## Example JSON
/// ```json
/// {
///   "username": "alice",
///   "credential_id": "q2z8V1...",
///   "counter": 1
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct CeremonyResponse {
    pub username: String,
    /// base64url, no padding
    pub credential_id: String,
    pub counter: u32,
}

impl From<CeremonyOutcome> for CeremonyResponse {
    fn from(outcome: CeremonyOutcome) -> Self {
        Self {
            username: outcome.username,
            credential_id: outcome.credential_id.to_base64url(),
            counter: outcome.counter,
        }
    }
}

/// `{ "publicKey": { ... } }`, the wrapper the browser API expects
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyOptions<T> {
    pub public_key: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOptions {
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    pub challenge: String,
    pub pub_key_cred_params: Vec<CredentialParameter>,
    pub timeout: u64,
    pub exclude_credentials: Vec<DescriptorJson>,
    pub authenticator_selection: AuthenticatorSelection,
    pub attestation: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub challenge: String,
    pub timeout: u64,
    pub rp_id: String,
    pub allow_credentials: Vec<DescriptorJson>,
    pub user_verification: UserVerification,
}

#[derive(Debug, Serialize)]
pub struct RelyingPartyEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// base64url subject id
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialParameter {
    #[serde(rename = "type")]
    pub kind: CredentialType,
    pub alg: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub resident_key: &'static str,
    pub require_resident_key: bool,
    pub user_verification: UserVerification,
}

#[derive(Debug, Serialize)]
pub struct DescriptorJson {
    #[serde(rename = "type")]
    pub kind: CredentialType,
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

impl From<&CredentialDescriptor> for DescriptorJson {
    fn from(descriptor: &CredentialDescriptor) -> Self {
        Self {
            kind: descriptor.kind,
            id: descriptor.id.to_base64url(),
            transports: descriptor.transports.clone(),
        }
    }
}

impl From<RegistrationChallenge> for PublicKeyOptions<CreationOptions> {
    fn from(challenge: RegistrationChallenge) -> Self {
        let rp = challenge.relying_party;
        let public_key = CreationOptions {
            rp: RelyingPartyEntity {
                id: rp.id,
                name: rp.name,
            },
            user: UserEntity {
                id: challenge.subject.id.to_base64url(),
                name: challenge.subject.username,
                display_name: challenge.subject.display_name,
            },
            challenge: challenge.challenge.to_base64url(),
            pub_key_cred_params: SUPPORTED_ALGORITHMS
                .iter()
                .map(|&alg| CredentialParameter {
                    kind: CredentialType::PublicKey,
                    alg,
                })
                .collect(),
            timeout: rp.timeout_ms,
            exclude_credentials: challenge
                .exclude_credentials
                .iter()
                .map(DescriptorJson::from)
                .collect(),
            authenticator_selection: AuthenticatorSelection {
                resident_key: "preferred",
                require_resident_key: false,
                user_verification: rp.user_verification,
            },
            attestation: "none",
        };
        Self { public_key }
    }
}

impl From<AuthenticationChallenge> for PublicKeyOptions<RequestOptions> {
    fn from(challenge: AuthenticationChallenge) -> Self {
        let rp = challenge.relying_party;
        Self {
            public_key: RequestOptions {
                challenge: challenge.challenge.to_base64url(),
                timeout: rp.timeout_ms,
                rp_id: rp.id,
                allow_credentials: challenge
                    .allow_credentials
                    .iter()
                    .map(DescriptorJson::from)
                    .collect(),
                user_verification: rp.user_verification,
            },
        }
    }
}
