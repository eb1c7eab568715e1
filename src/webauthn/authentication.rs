use crate::config::RelyingParty;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::models::{CeremonyKind, Challenge, CredentialDescriptor, CredentialId};
use crate::webauthn::response::AssertionResponse;
use crate::webauthn::verifier::{ExpectedAssertion, VerificationFailure};
use crate::webauthn::CeremonyOutcome;
use serde_json::Value;

/// Everything the client needs to call `navigator.credentials.get()`
#[derive(Debug, Clone)]
pub struct AuthenticationChallenge {
    pub relying_party: RelyingParty,
    pub challenge: Challenge,
    pub allow_credentials: Vec<CredentialDescriptor>,
}

pub fn start_authentication(state: &AppState, username: &str) -> AppResult<AuthenticationChallenge> {
    // Never creates the subject
    let subject = state.registry.get_required(username)?;

    let allow_credentials = state
        .registry
        .list_credential_descriptors(&subject.username)?;
    if allow_credentials.is_empty() {
        return Err(AppError::NoCredentialsEnrolled(subject.username));
    }

    let challenge = state
        .ledger
        .issue(&subject.username, CeremonyKind::Authentication);

    tracing::debug!(
        username,
        allowed = allow_credentials.len(),
        "authentication challenge issued"
    );

    Ok(AuthenticationChallenge {
        relying_party: state.relying_party.as_ref().clone(),
        challenge,
        allow_credentials,
    })
}

pub fn finish_authentication(
    state: &AppState,
    username: &str,
    credential: &Value,
) -> AppResult<CeremonyOutcome> {
    let response = AssertionResponse::parse(credential)?;

    let entry = state.ledger.consume(
        username,
        CeremonyKind::Authentication,
        &response.client_data.challenge,
    )?;

    let subject = state.registry.get_required(username)?;
    let stored = state
        .registry
        .get_credential(username, &response.credential_id)?;
    let allowed: Vec<CredentialId> = state
        .registry
        .list_credential_descriptors(username)?
        .into_iter()
        .map(|descriptor| descriptor.id)
        .collect();

    let rp = &state.relying_party;
    let expected = ExpectedAssertion {
        rp_id: &rp.id,
        origin: &rp.origin,
        challenge: &entry.challenge,
        user_verification: rp.user_verification,
        subject_id: &subject.id,
        public_key: &stored.public_key,
        stored_counter: stored.counter,
        allowed_credentials: &allowed,
    };
    let verified = state.verifier.verify_assertion(&response, &expected)?;

    if verified.credential_id != stored.credential_id {
        return Err(VerificationFailure::CredentialIdMismatch.into());
    }

    // Clone detection: a counter that does not move past the stored value means
    // the assertion was replayed or produced by a copy of the authenticator.
    // The comparison is repeated atomically by the registry, so a finish that
    // overlapped with a newer one cannot lower the stored counter.
    match state
        .registry
        .advance_counter(username, &stored.credential_id, verified.counter)
    {
        Ok(()) => {}
        Err(AppError::CounterReplaySuspected { stored: current, presented }) => {
            tracing::warn!(
                username,
                credential_id = %stored.credential_id,
                stored = current,
                presented,
                "rejecting non-increasing signature counter"
            );
            return Err(AppError::CounterReplaySuspected {
                stored: current,
                presented,
            });
        }
        // Credentials are never removed, so the record read above must still exist.
        Err(e) => {
            return Err(AppError::Internal(format!(
                "counter update lost its credential: {e}"
            )))
        }
    }

    tracing::info!(
        username,
        credential_id = %stored.credential_id,
        counter = verified.counter,
        "passkey authentication succeeded"
    );

    Ok(CeremonyOutcome {
        username: username.to_string(),
        credential_id: stored.credential_id,
        counter: verified.counter,
    })
}
