//! # Store Models
//!
//! Data structures held by the in-memory stores: subjects (registered users),
//! their enrolled passkey credentials, and the single-use challenges handed out
//! at the start of each ceremony.
//!
//! ## Key Concepts
//! - **Subject id**: 32 random bytes generated once per user. This, not the
//!   username, is what the authenticator binds into the credential.
//! - **Signature counter**: authenticator-reported usage count, used to detect
//!   cloned authenticators replaying old assertions.
//! - **Ceremony kind**: registration and authentication challenges live side by
//!   side without interfering with each other.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a server-generated subject id in bytes.
pub const SUBJECT_ID_LEN: usize = 32;

/// Length of a challenge value in bytes.
pub const CHALLENGE_LEN: usize = 32;

/// Opaque, server-generated identifier bound into every credential of a subject
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubjectId([u8; SUBJECT_ID_LEN]);

impl SubjectId {
    /// Generate a fresh id from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SUBJECT_ID_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SUBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// base64url (no padding), the form sent to the browser as `user.id`.
    pub fn to_base64url(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({})", self.to_base64url())
    }
}

/// A registered user
///
/// Created on the first registration start for a username and never
/// regenerated afterwards. Cloning is cheap enough to hand copies out of the
/// registry instead of references into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Human-chosen unique handle, used as the lookup key
    pub username: String,

    /// Name shown by the authenticator UI during passkey creation
    pub display_name: String,

    /// Server-generated identity bound into credential material
    pub id: SubjectId,

    pub created_at: DateTime<Utc>,
}

impl Subject {
    pub fn new(username: String, display_name: String) -> Self {
        Self {
            username,
            display_name,
            id: SubjectId::generate(),
            created_at: Utc::now(),
        }
    }
}

/// Authenticator-assigned credential identifier
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(&self.0)
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({})", self.to_base64url())
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl From<&[u8]> for CredentialId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// One enrolled passkey
///
/// ## What is stored?
/// - **Public Key**: COSE_Key bytes as produced by the authenticator; only the
///   verifier interprets them
/// - **Counter**: last signature counter accepted for this credential
/// - **Metadata**: transport hints, backup flags, authenticator model (AAGUID)
///
/// Only the public key is ever stored. The private key never leaves the
/// user's device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub credential_id: CredentialId,

    /// Subject this credential was enrolled for
    pub subject_id: SubjectId,

    /// COSE_Key encoded public key
    pub public_key: Vec<u8>,

    /// Signature counter
    /// Must strictly increase on every successful authentication
    pub counter: u32,

    /// Transport hints reported by the browser at registration
    /// Examples: "usb", "nfc", "ble", "internal", "hybrid"
    pub transports: Vec<String>,

    /// Whether the credential may be synced across devices
    pub backup_eligible: bool,

    /// Whether the credential is currently backed up
    pub backup_state: bool,

    /// Authenticator model identifier from the attested credential data
    pub aaguid: [u8; 16],

    /// Attestation statement format the credential was registered with
    /// Examples: "none", "packed"
    pub attestation_format: String,

    pub created_at: DateTime<Utc>,

    /// Updated every time the counter is written after an authentication
    pub last_used_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn descriptor(&self) -> CredentialDescriptor {
        CredentialDescriptor {
            id: self.credential_id.clone(),
            kind: CredentialType::PublicKey,
            transports: self.transports.clone(),
        }
    }
}

/// The only credential type WebAuthn defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialType {
    #[serde(rename = "public-key")]
    PublicKey,
}

/// Entry of an exclude or allow list handed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    pub id: CredentialId,
    pub kind: CredentialType,
    pub transports: Vec<String>,
}

/// Which ceremony a challenge belongs to
///
/// Registration and authentication challenges for the same username are
/// stored under different keys, so starting one never invalidates the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CeremonyKind::Registration => f.write_str("registration"),
            CeremonyKind::Authentication => f.write_str("authentication"),
        }
    }
}

/// Random challenge value
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge(Vec<u8>);

impl Challenge {
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; CHALLENGE_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(&self.0)
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Challenge({})", self.to_base64url())
    }
}

/// A live challenge held by the ledger
///
/// ## Challenge Lifecycle
/// 1. Created at ceremony start and stored under (username, kind)
/// 2. Either consumed exactly once at ceremony finish,
/// 3. or overwritten by a newer start for the same key and never usable again
#[derive(Debug, Clone)]
pub struct ChallengeEntry {
    pub username: String,
    pub kind: CeremonyKind,
    pub challenge: Challenge,
    pub issued_at: DateTime<Utc>,
}
