//! # Store Module
//!
//! In-memory state shared by all ceremonies:
//! - `models`: Data structures (Subject, CredentialRecord, ChallengeEntry)
//! - `registry`: users and their enrolled passkeys
//! - `ledger`: single-use registration and authentication challenges
//!
//! Neither store references the other. The ceremony code passes the username
//! between them by value, so either can later be backed by a durable store
//! without touching the protocol logic.

pub mod ledger;
pub mod models;
pub mod registry;

pub use ledger::ChallengeLedger;
pub use registry::CredentialRegistry;
