//! Authenticator data and attestation object decoding.
//!
//! Layout of authenticator data:
//!
//! ```text
//! rpIdHash (32) | flags (1) | signCount (4, BE) | [attested credential data] | [extensions]
//! attested credential data = aaguid (16) | credIdLen (2, BE) | credId | COSE_Key
//! ```

use crate::webauthn::cose::CoseKey;
use crate::webauthn::verifier::VerificationFailure;
use ciborium::value::Value;

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
pub const FLAG_BE: u8 = 0x08;
pub const FLAG_BS: u8 = 0x10;
pub const FLAG_AT: u8 = 0x40;
pub const FLAG_ED: u8 = 0x80;

const HEADER_LEN: usize = 37;

#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    pub attested_credential: Option<AttestedCredential>,
}

#[derive(Debug, Clone)]
pub struct AttestedCredential {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    pub public_key: CoseKey,
    /// COSE_Key re-encoded on its own, the form stored with the credential
    pub public_key_bytes: Vec<u8>,
}

impl AuthenticatorData {
    pub fn parse(data: &[u8]) -> Result<Self, VerificationFailure> {
        if data.len() < HEADER_LEN {
            return Err(malformed("authenticator data shorter than 37 bytes"));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&data[0..32]);
        let flags = data[32];
        let sign_count = u32::from_be_bytes([data[33], data[34], data[35], data[36]]);

        let attested_credential = if flags & FLAG_AT != 0 {
            Some(parse_attested_credential(&data[HEADER_LEN..])?)
        } else {
            None
        };

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential,
        })
    }

    pub fn user_present(&self) -> bool {
        self.flags & FLAG_UP != 0
    }

    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_UV != 0
    }

    pub fn backup_eligible(&self) -> bool {
        self.flags & FLAG_BE != 0
    }

    pub fn backup_state(&self) -> bool {
        self.flags & FLAG_BS != 0
    }
}

fn parse_attested_credential(data: &[u8]) -> Result<AttestedCredential, VerificationFailure> {
    if data.len() < 18 {
        return Err(malformed("attested credential data truncated"));
    }
    let mut aaguid = [0u8; 16];
    aaguid.copy_from_slice(&data[0..16]);
    let id_len = u16::from_be_bytes([data[16], data[17]]) as usize;
    let rest = &data[18..];
    if rest.len() < id_len {
        return Err(malformed("credential id truncated"));
    }
    let (credential_id, key_bytes) = rest.split_at(id_len);

    // Any extension map following the key is left unread.
    let key_value: Value = ciborium::from_reader(key_bytes)
        .map_err(|e| malformed(&format!("credential public key: {e}")))?;
    let public_key = CoseKey::from_value(&key_value)?;

    let mut public_key_bytes = Vec::new();
    ciborium::into_writer(&key_value, &mut public_key_bytes)
        .map_err(|e| malformed(&format!("credential public key: {e}")))?;

    Ok(AttestedCredential {
        aaguid,
        credential_id: credential_id.to_vec(),
        public_key,
        public_key_bytes,
    })
}

/// Decoded CBOR attestation object
#[derive(Debug, Clone)]
pub struct AttestationObject {
    pub format: String,
    pub auth_data: Vec<u8>,
    pub statement: Vec<(Value, Value)>,
}

impl AttestationObject {
    pub fn parse(bytes: &[u8]) -> Result<Self, VerificationFailure> {
        let value: Value = ciborium::from_reader(bytes)
            .map_err(|e| malformed(&format!("attestation object: {e}")))?;
        let Value::Map(map) = value else {
            return Err(malformed("attestation object is not a map"));
        };

        let mut format = None;
        let mut auth_data = None;
        let mut statement = None;
        for (key, value) in map {
            match (key, value) {
                (Value::Text(k), Value::Text(v)) if k == "fmt" => format = Some(v),
                (Value::Text(k), Value::Bytes(v)) if k == "authData" => auth_data = Some(v),
                (Value::Text(k), Value::Map(v)) if k == "attStmt" => statement = Some(v),
                _ => {}
            }
        }

        Ok(Self {
            format: format.ok_or_else(|| malformed("attestation object missing fmt"))?,
            auth_data: auth_data.ok_or_else(|| malformed("attestation object missing authData"))?,
            statement: statement.ok_or_else(|| malformed("attestation object missing attStmt"))?,
        })
    }

    pub fn statement_field(&self, name: &str) -> Option<&Value> {
        self.statement.iter().find_map(|(k, v)| match k {
            Value::Text(text) if text == name => Some(v),
            _ => None,
        })
    }
}

fn malformed(detail: &str) -> VerificationFailure {
    VerificationFailure::Malformed(detail.to_string())
}
