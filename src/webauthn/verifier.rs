//! # Response Verification
//!
//! The ceremonies hand cryptographic checking to a `CeremonyVerifier`. They
//! only rely on the fields named in `VerifiedRegistration` and
//! `VerifiedAssertion`; attestation formats and key encodings stay behind
//! this trait.
//!
//! `PasskeyVerifier` is the implementation the server runs with. It checks
//! client data (type, challenge, origin), the relying party id hash and flags
//! in the authenticator data, and the signature. It supports `none` and
//! `packed` self attestation with ES256 or EdDSA keys.
//!
//! Signature counters are *not* judged here; the authentication ceremony
//! compares them against the stored value itself.

use crate::config::UserVerification;
use crate::store::models::{Challenge, CredentialId, SubjectId};
use crate::webauthn::authenticator_data::{AttestationObject, AuthenticatorData};
use crate::webauthn::cose::CoseKey;
use crate::webauthn::response::{AssertionResponse, ClientData, RegistrationResponse};
use ciborium::value::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

const CLIENT_DATA_CREATE: &str = "webauthn.create";
const CLIENT_DATA_GET: &str = "webauthn.get";

/// Why the verifier rejected a response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("unexpected client data type '{0}'")]
    ClientDataType(String),

    #[error("client data challenge does not match the issued challenge")]
    ChallengeMismatch,

    #[error("unexpected origin '{0}'")]
    OriginMismatch(String),

    #[error("cross-origin ceremonies are not accepted")]
    CrossOrigin,

    #[error("relying party id hash does not match")]
    RpIdMismatch,

    #[error("user presence flag not set")]
    UserNotPresent,

    #[error("user verification required but not performed")]
    UserNotVerified,

    #[error("authenticator data carries no attested credential")]
    MissingAttestedCredential,

    #[error("credential id does not match the attested credential")]
    CredentialIdMismatch,

    #[error("credential is not in the allowed list")]
    CredentialNotAllowed,

    #[error("user handle does not belong to the subject")]
    UserHandleMismatch,

    #[error("unsupported attestation: {0}")]
    UnsupportedAttestation(String),

    #[error("unsupported COSE algorithm {0}")]
    UnsupportedAlgorithm(i64),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed {0}")]
    Malformed(String),
}

/// What a registration response must match
#[derive(Debug, Clone, Copy)]
pub struct ExpectedRegistration<'a> {
    pub rp_id: &'a str,
    pub origin: &'a str,
    /// The challenge consumed from the ledger
    pub challenge: &'a Challenge,
    pub user_verification: UserVerification,
}

/// What an assertion must match, plus the stored credential it claims to use
#[derive(Debug, Clone, Copy)]
pub struct ExpectedAssertion<'a> {
    pub rp_id: &'a str,
    pub origin: &'a str,
    pub challenge: &'a Challenge,
    pub user_verification: UserVerification,
    pub subject_id: &'a SubjectId,
    /// COSE_Key of the credential resolved from the registry
    pub public_key: &'a [u8],
    /// Counter currently stored for that credential
    pub stored_counter: u32,
    /// Every credential id enrolled for the subject
    pub allowed_credentials: &'a [CredentialId],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRegistration {
    pub credential_id: CredentialId,
    /// COSE_Key bytes to store with the credential
    pub public_key: Vec<u8>,
    pub counter: u32,
    pub aaguid: [u8; 16],
    pub attestation_format: String,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    pub credential_id: CredentialId,
    /// Counter reported by the authenticator for this assertion
    pub counter: u32,
    pub user_verified: bool,
    pub backup_state: bool,
}

/// Cryptographic verification of ceremony responses
pub trait CeremonyVerifier: Send + Sync {
    fn verify_registration(
        &self,
        response: &RegistrationResponse,
        expected: &ExpectedRegistration<'_>,
    ) -> Result<VerifiedRegistration, VerificationFailure>;

    fn verify_assertion(
        &self,
        response: &AssertionResponse,
        expected: &ExpectedAssertion<'_>,
    ) -> Result<VerifiedAssertion, VerificationFailure>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PasskeyVerifier;

impl PasskeyVerifier {
    pub fn new() -> Self {
        Self
    }
}

impl CeremonyVerifier for PasskeyVerifier {
    fn verify_registration(
        &self,
        response: &RegistrationResponse,
        expected: &ExpectedRegistration<'_>,
    ) -> Result<VerifiedRegistration, VerificationFailure> {
        check_client_data(
            &response.client_data,
            CLIENT_DATA_CREATE,
            expected.origin,
            expected.challenge,
        )?;

        let attestation = AttestationObject::parse(&response.attestation_object)?;
        let auth_data = AuthenticatorData::parse(&attestation.auth_data)?;
        check_authenticator_data(&auth_data, expected.rp_id, expected.user_verification)?;

        let attested = auth_data
            .attested_credential
            .as_ref()
            .ok_or(VerificationFailure::MissingAttestedCredential)?;
        if attested.credential_id != response.credential_id.as_bytes() {
            return Err(VerificationFailure::CredentialIdMismatch);
        }

        let client_data_hash = Sha256::digest(&response.client_data_json);
        verify_attestation_statement(&attestation, &attested.public_key, &client_data_hash)?;

        Ok(VerifiedRegistration {
            credential_id: response.credential_id.clone(),
            public_key: attested.public_key_bytes.clone(),
            counter: auth_data.sign_count,
            aaguid: attested.aaguid,
            attestation_format: attestation.format.clone(),
            user_verified: auth_data.user_verified(),
            backup_eligible: auth_data.backup_eligible(),
            backup_state: auth_data.backup_state(),
        })
    }

    fn verify_assertion(
        &self,
        response: &AssertionResponse,
        expected: &ExpectedAssertion<'_>,
    ) -> Result<VerifiedAssertion, VerificationFailure> {
        check_client_data(
            &response.client_data,
            CLIENT_DATA_GET,
            expected.origin,
            expected.challenge,
        )?;

        if !expected
            .allowed_credentials
            .contains(&response.credential_id)
        {
            return Err(VerificationFailure::CredentialNotAllowed);
        }
        if let Some(user_handle) = &response.user_handle {
            if user_handle.as_slice() != expected.subject_id.as_bytes() {
                return Err(VerificationFailure::UserHandleMismatch);
            }
        }

        let auth_data = AuthenticatorData::parse(&response.authenticator_data)?;
        check_authenticator_data(&auth_data, expected.rp_id, expected.user_verification)?;

        let key = CoseKey::from_bytes(expected.public_key)?;
        let mut signed = response.authenticator_data.clone();
        signed.extend_from_slice(&Sha256::digest(&response.client_data_json));
        key.verify(&signed, &response.signature)?;

        Ok(VerifiedAssertion {
            credential_id: response.credential_id.clone(),
            counter: auth_data.sign_count,
            user_verified: auth_data.user_verified(),
            backup_state: auth_data.backup_state(),
        })
    }
}

fn check_client_data(
    client_data: &ClientData,
    expected_type: &str,
    expected_origin: &str,
    expected_challenge: &Challenge,
) -> Result<(), VerificationFailure> {
    if client_data.kind != expected_type {
        return Err(VerificationFailure::ClientDataType(client_data.kind.clone()));
    }
    let challenge_matches: bool = client_data
        .challenge
        .as_bytes()
        .ct_eq(expected_challenge.as_bytes())
        .into();
    if !challenge_matches {
        return Err(VerificationFailure::ChallengeMismatch);
    }
    if client_data.origin != expected_origin {
        return Err(VerificationFailure::OriginMismatch(client_data.origin.clone()));
    }
    if client_data.cross_origin {
        return Err(VerificationFailure::CrossOrigin);
    }
    Ok(())
}

fn check_authenticator_data(
    auth_data: &AuthenticatorData,
    rp_id: &str,
    user_verification: UserVerification,
) -> Result<(), VerificationFailure> {
    let rp_id_hash: [u8; 32] = Sha256::digest(rp_id.as_bytes()).into();
    if auth_data.rp_id_hash != rp_id_hash {
        return Err(VerificationFailure::RpIdMismatch);
    }
    if !auth_data.user_present() {
        return Err(VerificationFailure::UserNotPresent);
    }
    if user_verification == UserVerification::Required && !auth_data.user_verified() {
        return Err(VerificationFailure::UserNotVerified);
    }
    Ok(())
}

fn verify_attestation_statement(
    attestation: &AttestationObject,
    credential_key: &CoseKey,
    client_data_hash: &[u8],
) -> Result<(), VerificationFailure> {
    match attestation.format.as_str() {
        "none" => {
            if attestation.statement.is_empty() {
                Ok(())
            } else {
                Err(VerificationFailure::Malformed(
                    "none attestation with a non-empty statement".to_string(),
                ))
            }
        }
        "packed" => {
            if attestation.statement_field("x5c").is_some() {
                return Err(VerificationFailure::UnsupportedAttestation(
                    "packed attestation with a certificate chain".to_string(),
                ));
            }
            let alg = match attestation.statement_field("alg") {
                Some(Value::Integer(alg)) => i64::try_from(i128::from(*alg))
                    .map_err(|_| VerificationFailure::Malformed("attStmt alg".to_string()))?,
                _ => return Err(VerificationFailure::Malformed("attStmt alg".to_string())),
            };
            if alg != credential_key.algorithm() {
                return Err(VerificationFailure::UnsupportedAlgorithm(alg));
            }
            let signature = match attestation.statement_field("sig") {
                Some(Value::Bytes(sig)) => sig,
                _ => return Err(VerificationFailure::Malformed("attStmt sig".to_string())),
            };

            let mut signed = attestation.auth_data.clone();
            signed.extend_from_slice(client_data_hash);
            credential_key.verify(&signed, signature)
        }
        other => Err(VerificationFailure::UnsupportedAttestation(format!(
            "format '{other}'"
        ))),
    }
}
