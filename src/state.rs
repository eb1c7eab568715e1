//! # Application State
//!
//! Shared state accessible to all request handlers. Axum clones the state for
//! each request, which is cheap because every field is behind an `Arc`.
//!
//! ## What is shared?
//! - the credential registry (users and passkeys)
//! - the challenge ledger (live single-use challenges)
//! - the verifier that checks signatures and attestation
//! - the relying party parameters the ceremonies run with

use crate::config::{Config, RelyingParty};
use crate::store::{ChallengeLedger, CredentialRegistry};
use crate::webauthn::verifier::{CeremonyVerifier, PasskeyVerifier};
use anyhow::Result;
use std::sync::Arc;

/// Shared application state
///
/// ## Thread Safety
/// The stores use sharded maps with per-entry locking and the verifier is
/// `Send + Sync`, so one state serves every concurrent ceremony.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CredentialRegistry>,

    pub ledger: Arc<ChallengeLedger>,

    /// Behind a trait object so tests and alternative backends can swap it
    pub verifier: Arc<dyn CeremonyVerifier>,

    pub relying_party: Arc<RelyingParty>,
}

impl AppState {
    /// Initialize application state with the built-in passkey verifier
    ///
    /// # Errors
    /// Returns an error if the relying party configuration is invalid
    /// (e.g., malformed origin URL)
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_verifier(config, Arc::new(PasskeyVerifier::new()))
    }

    pub fn with_verifier(config: &Config, verifier: Arc<dyn CeremonyVerifier>) -> Result<Self> {
        config.validate()?;
        let relying_party = config.relying_party()?;

        Ok(AppState {
            registry: Arc::new(CredentialRegistry::new()),
            ledger: Arc::new(ChallengeLedger::new(config.challenge_max_age())),
            verifier,
            relying_party: Arc::new(relying_party),
        })
    }
}
