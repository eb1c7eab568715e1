//! # Passkey Registration Logic
//!
//! Server side of creating a new passkey credential. Registration is a
//! two-step process: start and finish.
//!
//! ## Registration Flow
//! 1. **Start**: resolve or create the subject → issue challenge → send to client
//! 2. **Finish**: consume challenge → verify credential → store public key
//!
//! ## Security Concepts
//! - **Challenge**: random value the authenticator signs over, single use
//! - **Exclude list**: credentials already enrolled, so the same authenticator
//!   is not enrolled twice
//! - **Attestation**: the authenticator's signature over the new credential

use crate::config::RelyingParty;
use crate::error::AppResult;
use crate::state::AppState;
use crate::store::models::{
    CeremonyKind, Challenge, CredentialDescriptor, CredentialRecord, Subject,
};
use crate::webauthn::response::RegistrationResponse;
use crate::webauthn::verifier::ExpectedRegistration;
use crate::webauthn::{validate_username, CeremonyOutcome};
use chrono::Utc;
use serde_json::Value;

/// Everything the client needs to call `navigator.credentials.create()`
#[derive(Debug, Clone)]
pub struct RegistrationChallenge {
    pub relying_party: RelyingParty,
    pub subject: Subject,
    pub challenge: Challenge,
    /// Credentials the subject already enrolled
    pub exclude_credentials: Vec<CredentialDescriptor>,
}

/// Start the passkey registration process
///
/// Creates the subject on first use (the username is looked up, never
/// replaced) and issues a registration challenge, discarding any earlier
/// unfinished registration for the same username.
///
/// ## Errors
/// - BadRequest: blank username
pub fn start_registration(
    state: &AppState,
    username: &str,
    display_name: Option<&str>,
) -> AppResult<RegistrationChallenge> {
    let username = validate_username(username)?;
    let display_name = resolve_display_name(username, display_name);

    let subject = state.registry.get_or_create(username, &display_name);
    let challenge = state
        .ledger
        .issue(&subject.username, CeremonyKind::Registration);
    let exclude_credentials = state
        .registry
        .list_credential_descriptors(&subject.username)?;

    tracing::debug!(
        username,
        excluded = exclude_credentials.len(),
        "registration challenge issued"
    );

    Ok(RegistrationChallenge {
        relying_party: state.relying_party.as_ref().clone(),
        subject,
        challenge,
        exclude_credentials,
    })
}

/// Finish the passkey registration process
///
/// ## Flow
/// 1. Parse the credential far enough to read the embedded challenge
/// 2. Consume the registration challenge (fails fast before any crypto)
/// 3. Verify attestation, origin and relying party
/// 4. Store the new credential with its initial counter
///
/// Nothing is stored unless every step succeeds.
///
/// ## Errors
/// - MalformedResponsePayload: credential JSON unusable; challenge not spent
/// - ChallengeMissing / ChallengeMismatch / ChallengeExpired
/// - VerificationFailed: the verifier rejected the response
/// - DuplicateCredential: credential id belongs to another user
pub fn finish_registration(
    state: &AppState,
    username: &str,
    credential: &Value,
) -> AppResult<CeremonyOutcome> {
    let response = RegistrationResponse::parse(credential)?;

    let entry = state.ledger.consume(
        username,
        CeremonyKind::Registration,
        &response.client_data.challenge,
    )?;
    let subject = state.registry.get_required(username)?;

    let rp = &state.relying_party;
    let expected = ExpectedRegistration {
        rp_id: &rp.id,
        origin: &rp.origin,
        challenge: &entry.challenge,
        user_verification: rp.user_verification,
    };
    let verified = state.verifier.verify_registration(&response, &expected)?;

    let record = CredentialRecord {
        credential_id: verified.credential_id.clone(),
        subject_id: subject.id,
        public_key: verified.public_key,
        counter: verified.counter,
        transports: response.transports,
        backup_eligible: verified.backup_eligible,
        backup_state: verified.backup_state,
        aaguid: verified.aaguid,
        attestation_format: verified.attestation_format,
        created_at: Utc::now(),
        last_used_at: None,
    };
    state.registry.add_credential(username, record)?;

    tracing::info!(
        username,
        credential_id = %verified.credential_id,
        counter = verified.counter,
        "passkey registered"
    );

    Ok(CeremonyOutcome {
        username: username.to_string(),
        credential_id: verified.credential_id,
        counter: verified.counter,
    })
}

fn resolve_display_name(username: &str, display_name: Option<&str>) -> String {
    match display_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => username.to_string(),
    }
}
