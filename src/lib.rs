//! # Passkey Ceremony Core
//!
//! Server-side orchestration of WebAuthn passkey ceremonies: enrolling a
//! passkey for a user and signing in with it.
//!
//! ## Layout
//! - `store`: the credential registry and the single-use challenge ledger
//! - `webauthn`: ceremony orchestration and response verification
//! - `handlers`: the JSON-over-HTTP surface
//! - `config`, `error`, `state`: ambient plumbing
//!
//! ## Key Concepts
//! - **Subject**: a user, identified by username, with a random opaque id
//! - **Credential**: a passkey public key bound to one subject
//! - **Challenge**: a random value issued at start and consumed at finish

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod store;
pub mod webauthn;
