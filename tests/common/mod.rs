//! Shared fixtures: a software authenticator that produces the same JSON a
//! browser would hand back from `navigator.credentials.create()` / `.get()`.

#![allow(dead_code)]

use base64::prelude::*;
use ciborium::value::Value;
use passkey_ceremony::config::{Config, UserVerification};
use passkey_ceremony::state::AppState;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::{json, Value as Json};
use sha2::{Digest, Sha256};

pub const RP_ID: &str = "localhost";
pub const ORIGIN: &str = "http://localhost:8080";

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
pub const FLAG_AT: u8 = 0x40;

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        rp_id: RP_ID.to_string(),
        rp_origin: ORIGIN.to_string(),
        rp_name: "Passkey Test".to_string(),
        timeout_ms: 60_000,
        challenge_ttl_secs: 300,
        user_verification: UserVerification::Preferred,
    }
}

pub fn test_state() -> AppState {
    AppState::new(&test_config()).unwrap()
}

pub fn b64(bytes: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

pub fn unb64(text: &str) -> Vec<u8> {
    BASE64_URL_SAFE_NO_PAD.decode(text).unwrap()
}

/// How the authenticator attests a new credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attestation {
    None,
    /// `packed` signed with the credential key itself
    PackedSelf,
}

enum SoftKey {
    P256(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
    Rs256(rsa::pkcs1v15::SigningKey<Sha256>),
}

impl SoftKey {
    fn cose_public_key(&self) -> Value {
        match self {
            SoftKey::P256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                Value::Map(vec![
                    (int(1), int(2)),
                    (int(3), int(-7)),
                    (int(-1), int(1)),
                    (int(-2), Value::Bytes(point.x().unwrap().to_vec())),
                    (int(-3), Value::Bytes(point.y().unwrap().to_vec())),
                ])
            }
            SoftKey::Ed25519(key) => Value::Map(vec![
                (int(1), int(1)),
                (int(3), int(-8)),
                (int(-1), int(6)),
                (int(-2), Value::Bytes(key.verifying_key().to_bytes().to_vec())),
            ]),
            SoftKey::Rs256(key) => {
                use rsa::traits::PublicKeyParts;
                let public = key.as_ref().to_public_key();
                Value::Map(vec![
                    (int(1), int(3)),
                    (int(3), int(-257)),
                    (int(-1), Value::Bytes(public.n().to_bytes_be())),
                    (int(-2), Value::Bytes(public.e().to_bytes_be())),
                ])
            }
        }
    }

    fn alg(&self) -> i64 {
        match self {
            SoftKey::P256(_) => -7,
            SoftKey::Ed25519(_) => -8,
            SoftKey::Rs256(_) => -257,
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            SoftKey::P256(key) => {
                use p256::ecdsa::signature::Signer;
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            SoftKey::Ed25519(key) => {
                use ed25519_dalek::Signer;
                key.sign(message).to_bytes().to_vec()
            }
            SoftKey::Rs256(key) => {
                use rsa::signature::{SignatureEncoding, Signer};
                key.sign(message).to_vec()
            }
        }
    }
}

fn int(value: i64) -> Value {
    Value::Integer(value.into())
}

/// A single-credential authenticator
///
/// `rp_id` and `origin` are what the authenticator and browser claim; tests
/// change them to simulate phishing origins or foreign relying parties.
pub struct SoftAuthenticator {
    key: SoftKey,
    pub credential_id: Vec<u8>,
    pub counter: u32,
    pub rp_id: String,
    pub origin: String,
    pub flags: u8,
    /// Subject id learned at registration, reported back as the user handle
    pub user_handle: Option<Vec<u8>>,
}

impl SoftAuthenticator {
    pub fn es256() -> Self {
        Self::with_key(SoftKey::P256(p256::ecdsa::SigningKey::random(&mut OsRng)))
    }

    pub fn ed25519() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::with_key(SoftKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
    }

    pub fn rs256() -> Self {
        let private = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        Self::with_key(SoftKey::Rs256(rsa::pkcs1v15::SigningKey::new(private)))
    }

    fn with_key(key: SoftKey) -> Self {
        let mut credential_id = vec![0u8; 16];
        OsRng.fill_bytes(&mut credential_id);
        Self {
            key,
            credential_id,
            counter: 0,
            rp_id: RP_ID.to_string(),
            origin: ORIGIN.to_string(),
            flags: FLAG_UP | FLAG_UV,
            user_handle: None,
        }
    }

    pub fn credential_id_b64(&self) -> String {
        b64(&self.credential_id)
    }

    pub fn client_data_json(&self, kind: &str, challenge_b64: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": kind,
            "challenge": challenge_b64,
            "origin": self.origin,
            "crossOrigin": false,
        }))
        .unwrap()
    }

    fn authenticator_data(&self, counter: u32, attested: bool) -> Vec<u8> {
        let mut data = Sha256::digest(self.rp_id.as_bytes()).to_vec();
        let flags = if attested {
            self.flags | FLAG_AT
        } else {
            self.flags
        };
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        if attested {
            data.extend_from_slice(&[0u8; 16]);
            data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
            data.extend_from_slice(&self.credential_id);
            ciborium::into_writer(&self.key.cose_public_key(), &mut data).unwrap();
        }
        data
    }

    /// Answer a registration challenge the way `navigator.credentials.create()` would
    pub fn register(&self, challenge_b64: &str, attestation: Attestation) -> Json {
        let client_data_json = self.client_data_json("webauthn.create", challenge_b64);
        let auth_data = self.authenticator_data(self.counter, true);

        let (fmt, statement) = match attestation {
            Attestation::None => ("none", Vec::new()),
            Attestation::PackedSelf => {
                let mut signed = auth_data.clone();
                signed.extend_from_slice(&Sha256::digest(&client_data_json));
                (
                    "packed",
                    vec![
                        (Value::Text("alg".to_string()), int(self.key.alg())),
                        (
                            Value::Text("sig".to_string()),
                            Value::Bytes(self.key.sign(&signed)),
                        ),
                    ],
                )
            }
        };
        let object = Value::Map(vec![
            (Value::Text("fmt".to_string()), Value::Text(fmt.to_string())),
            (Value::Text("attStmt".to_string()), Value::Map(statement)),
            (Value::Text("authData".to_string()), Value::Bytes(auth_data)),
        ]);
        let mut attestation_object = Vec::new();
        ciborium::into_writer(&object, &mut attestation_object).unwrap();

        json!({
            "id": self.credential_id_b64(),
            "rawId": self.credential_id_b64(),
            "type": "public-key",
            "response": {
                "clientDataJSON": b64(&client_data_json),
                "attestationObject": b64(&attestation_object),
                "transports": ["internal", "hybrid"],
            },
        })
    }

    /// Sign an authentication challenge, advancing the counter by one
    pub fn sign_in(&mut self, challenge_b64: &str) -> Json {
        self.counter += 1;
        self.sign_in_with_counter(challenge_b64, self.counter)
    }

    /// Sign an authentication challenge reporting an arbitrary counter
    pub fn sign_in_with_counter(&self, challenge_b64: &str, counter: u32) -> Json {
        let client_data_json = self.client_data_json("webauthn.get", challenge_b64);
        let auth_data = self.authenticator_data(counter, false);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature = self.key.sign(&signed);

        json!({
            "id": self.credential_id_b64(),
            "rawId": self.credential_id_b64(),
            "type": "public-key",
            "response": {
                "clientDataJSON": b64(&client_data_json),
                "authenticatorData": b64(&auth_data),
                "signature": b64(&signature),
                "userHandle": self.user_handle.as_deref().map(b64),
            },
        })
    }
}
