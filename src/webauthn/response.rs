//! # Client Response Parsing
//!
//! Turns the browser's `PublicKeyCredential` JSON into typed responses. This
//! runs before any challenge is consumed: a payload that cannot be parsed far
//! enough to find its embedded challenge is rejected without spending the
//! single-use challenge.
//!
//! Only structure is checked here. Signatures, authenticator data and
//! attestation objects are left as bytes for the verifier.

use crate::error::{AppError, AppResult};
use crate::store::models::{Challenge, CredentialId};
use base64::prelude::*;
use serde::Deserialize;
use serde_json::Value;

/// The `clientDataJSON` structure the browser signs over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientData {
    /// "webauthn.create" or "webauthn.get"
    pub kind: String,
    pub challenge: Challenge,
    pub origin: String,
    pub cross_origin: bool,
}

/// Response to `navigator.credentials.create()`
#[derive(Debug, Clone)]
pub struct RegistrationResponse {
    pub credential_id: CredentialId,
    /// Raw bytes, hashed by the verifier
    pub client_data_json: Vec<u8>,
    pub client_data: ClientData,
    /// CBOR attestation object
    pub attestation_object: Vec<u8>,
    pub transports: Vec<String>,
}

/// Response to `navigator.credentials.get()`
#[derive(Debug, Clone)]
pub struct AssertionResponse {
    pub credential_id: CredentialId,
    pub client_data_json: Vec<u8>,
    pub client_data: ClientData,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
    /// Subject id the authenticator stored with the credential, if it reported one
    pub user_handle: Option<Vec<u8>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredential<R> {
    id: String,
    raw_id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    response: R,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttestation {
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    attestation_object: String,
    #[serde(default)]
    transports: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssertion {
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    authenticator_data: String,
    signature: String,
    user_handle: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClientData {
    #[serde(rename = "type")]
    kind: String,
    challenge: String,
    origin: String,
    #[serde(default)]
    cross_origin: bool,
}

impl RegistrationResponse {
    pub fn parse(credential: &Value) -> AppResult<Self> {
        let raw: RawCredential<RawAttestation> = from_value(credential)?;
        let credential_id = credential_id(&raw)?;
        let client_data_json = decode("clientDataJSON", &raw.response.client_data_json)?;
        let client_data = ClientData::parse(&client_data_json)?;

        Ok(Self {
            credential_id,
            client_data_json,
            client_data,
            attestation_object: decode("attestationObject", &raw.response.attestation_object)?,
            transports: raw.response.transports,
        })
    }
}

impl AssertionResponse {
    pub fn parse(credential: &Value) -> AppResult<Self> {
        let raw: RawCredential<RawAssertion> = from_value(credential)?;
        let credential_id = credential_id(&raw)?;
        let client_data_json = decode("clientDataJSON", &raw.response.client_data_json)?;
        let client_data = ClientData::parse(&client_data_json)?;

        // browsers send an empty string when the authenticator has no user handle
        let user_handle = match raw.response.user_handle.as_deref() {
            None | Some("") => None,
            Some(handle) => Some(decode("userHandle", handle)?),
        };

        Ok(Self {
            credential_id,
            client_data_json,
            client_data,
            authenticator_data: decode("authenticatorData", &raw.response.authenticator_data)?,
            signature: decode("signature", &raw.response.signature)?,
            user_handle,
        })
    }
}

impl ClientData {
    pub fn parse(json: &[u8]) -> AppResult<Self> {
        let raw: RawClientData = serde_json::from_slice(json)
            .map_err(|e| malformed(format!("clientDataJSON: {e}")))?;
        let challenge = decode("challenge", &raw.challenge)?;
        if challenge.is_empty() {
            return Err(malformed("empty challenge in client data"));
        }

        Ok(Self {
            kind: raw.kind,
            challenge: Challenge::from_bytes(challenge),
            origin: raw.origin,
            cross_origin: raw.cross_origin,
        })
    }
}

fn from_value<'a, T: Deserialize<'a>>(credential: &'a Value) -> AppResult<T> {
    T::deserialize(credential).map_err(|e| malformed(format!("credential: {e}")))
}

fn credential_id<R>(raw: &RawCredential<R>) -> AppResult<CredentialId> {
    if raw.kind != "public-key" {
        return Err(malformed(format!("unsupported credential type '{}'", raw.kind)));
    }
    let id = decode("id", &raw.id)?;
    if let Some(raw_id) = &raw.raw_id {
        if decode("rawId", raw_id)? != id {
            return Err(malformed("id and rawId differ"));
        }
    }
    if id.is_empty() {
        return Err(malformed("empty credential id"));
    }
    Ok(CredentialId::new(id))
}

/// base64url, tolerating the padding some clients still append
fn decode(field: &str, value: &str) -> AppResult<Vec<u8>> {
    BASE64_URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|_| malformed(format!("{field} is not valid base64url")))
}

fn malformed(detail: impl Into<String>) -> AppError {
    AppError::MalformedResponsePayload(detail.into())
}
