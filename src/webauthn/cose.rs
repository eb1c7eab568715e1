//! COSE_Key public keys (RFC 9053) as stored with each credential.
//!
//! Supported: EC2 / P-256 / ES256 (-7), RSA / RS256 (-257, PKCS#1 v1.5 with
//! SHA-256) and OKP / Ed25519 / EdDSA (-8).

use crate::webauthn::verifier::VerificationFailure;
use ciborium::value::Value;
use ed25519_dalek::Verifier as _;
use p256::ecdsa::signature::Verifier as _;
use p256::{EncodedPoint, FieldBytes};
use rsa::pkcs1v15;
use rsa::signature::Verifier as _;
use rsa::{BigUint, RsaPublicKey};
use sha2::Sha256;

pub const COSE_ALG_ES256: i64 = -7;
pub const COSE_ALG_EDDSA: i64 = -8;
pub const COSE_ALG_RS256: i64 = -257;

/// Algorithms advertised in creation options, in preference order
pub const SUPPORTED_ALGORITHMS: [i64; 3] = [COSE_ALG_ES256, COSE_ALG_RS256, COSE_ALG_EDDSA];

const KTY_OKP: i128 = 1;
const KTY_EC2: i128 = 2;
const KTY_RSA: i128 = 3;
const CRV_P256: i128 = 1;
const CRV_ED25519: i128 = 6;

const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;
// RSA keys reuse the negative labels for modulus and exponent
const LABEL_N: i64 = -1;
const LABEL_E: i64 = -2;

#[derive(Debug, Clone)]
pub enum CoseKey {
    Es256(p256::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
    Rs256(RsaPublicKey),
}

impl CoseKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerificationFailure> {
        let value: Value = ciborium::from_reader(bytes)
            .map_err(|e| VerificationFailure::InvalidPublicKey(format!("COSE key CBOR: {e}")))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, VerificationFailure> {
        let Value::Map(map) = value else {
            return Err(invalid("COSE key is not a map"));
        };

        let alg = int_field(map, LABEL_ALG).ok_or_else(|| invalid("missing alg"))?;
        let alg = i64::try_from(alg).map_err(|_| invalid("alg out of range"))?;
        let kty = int_field(map, LABEL_KTY).ok_or_else(|| invalid("missing kty"))?;

        match alg {
            COSE_ALG_ES256 => {
                if kty != KTY_EC2 || int_field(map, LABEL_CRV) != Some(CRV_P256) {
                    return Err(invalid("ES256 requires an EC2 P-256 key"));
                }
                let x = coordinate(map, LABEL_X)?;
                let y = coordinate(map, LABEL_Y)?;
                let point = EncodedPoint::from_affine_coordinates(
                    FieldBytes::from_slice(x),
                    FieldBytes::from_slice(y),
                    false,
                );
                p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                    .map(CoseKey::Es256)
                    .map_err(|_| invalid("point is not on P-256"))
            }
            COSE_ALG_EDDSA => {
                if kty != KTY_OKP || int_field(map, LABEL_CRV) != Some(CRV_ED25519) {
                    return Err(invalid("EdDSA requires an OKP Ed25519 key"));
                }
                let x: [u8; 32] = coordinate(map, LABEL_X)?
                    .try_into()
                    .map_err(|_| invalid("Ed25519 key must be 32 bytes"))?;
                ed25519_dalek::VerifyingKey::from_bytes(&x)
                    .map(CoseKey::Ed25519)
                    .map_err(|_| invalid("invalid Ed25519 point"))
            }
            COSE_ALG_RS256 => {
                if kty != KTY_RSA {
                    return Err(invalid("RS256 requires an RSA key"));
                }
                let n = byte_field(map, LABEL_N).ok_or_else(|| invalid("missing RSA modulus"))?;
                let e = byte_field(map, LABEL_E).ok_or_else(|| invalid("missing RSA exponent"))?;
                RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
                    .map(CoseKey::Rs256)
                    .map_err(|e| invalid(&format!("RSA key: {e}")))
            }
            other => Err(VerificationFailure::UnsupportedAlgorithm(other)),
        }
    }

    pub fn algorithm(&self) -> i64 {
        match self {
            CoseKey::Es256(_) => COSE_ALG_ES256,
            CoseKey::Ed25519(_) => COSE_ALG_EDDSA,
            CoseKey::Rs256(_) => COSE_ALG_RS256,
        }
    }

    /// ES256 signatures are DER encoded; Ed25519 signatures are the raw 64 bytes;
    /// RS256 signatures are the PKCS#1 v1.5 block, as long as the modulus.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), VerificationFailure> {
        match self {
            CoseKey::Es256(key) => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| VerificationFailure::InvalidSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| VerificationFailure::InvalidSignature)
            }
            CoseKey::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| VerificationFailure::InvalidSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| VerificationFailure::InvalidSignature)
            }
            CoseKey::Rs256(key) => {
                let signature = pkcs1v15::Signature::try_from(signature)
                    .map_err(|_| VerificationFailure::InvalidSignature)?;
                pkcs1v15::VerifyingKey::<Sha256>::new(key.clone())
                    .verify(message, &signature)
                    .map_err(|_| VerificationFailure::InvalidSignature)
            }
        }
    }
}

pub(crate) fn map_field(map: &[(Value, Value)], label: i64) -> Option<&Value> {
    map.iter().find_map(|(k, v)| match k {
        Value::Integer(i) if i128::from(*i) == i128::from(label) => Some(v),
        _ => None,
    })
}

fn int_field(map: &[(Value, Value)], label: i64) -> Option<i128> {
    match map_field(map, label)? {
        Value::Integer(i) => Some(i128::from(*i)),
        _ => None,
    }
}

fn byte_field(map: &[(Value, Value)], label: i64) -> Option<&[u8]> {
    match map_field(map, label)? {
        Value::Bytes(bytes) if !bytes.is_empty() => Some(bytes.as_slice()),
        _ => None,
    }
}

fn coordinate(map: &[(Value, Value)], label: i64) -> Result<&[u8], VerificationFailure> {
    match map_field(map, label) {
        Some(Value::Bytes(bytes)) if bytes.len() == 32 => Ok(bytes.as_slice()),
        _ => Err(invalid("coordinate must be 32 bytes")),
    }
}

fn invalid(detail: &str) -> VerificationFailure {
    VerificationFailure::InvalidPublicKey(detail.to_string())
}
