//! # Challenge Ledger
//!
//! Single-use freshness tokens, one live entry per (username, ceremony kind).
//!
//! ## Rules
//! - `issue` overwrites whatever was stored for the key; the old value can
//!   never be consumed afterwards
//! - `consume` removes the entry before looking at it, so a value is spent
//!   whether or not it matched
//! - entries older than the configured maximum age are rejected at consume
//!   time and swept by `purge_expired`

use crate::error::{AppError, AppResult};
use crate::store::models::{CeremonyKind, Challenge, ChallengeEntry};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use subtle::ConstantTimeEq;

type LedgerKey = (String, CeremonyKind);

pub struct ChallengeLedger {
    entries: DashMap<LedgerKey, ChallengeEntry>,
    /// `None` disables expiry
    max_age: Option<Duration>,
}

impl ChallengeLedger {
    pub fn new(max_age: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            max_age,
        }
    }

    /// Generate and store a fresh challenge for `(username, kind)`.
    pub fn issue(&self, username: &str, kind: CeremonyKind) -> Challenge {
        self.issue_at(username, kind, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        username: &str,
        kind: CeremonyKind,
        issued_at: DateTime<Utc>,
    ) -> Challenge {
        let challenge = Challenge::generate();
        let entry = ChallengeEntry {
            username: username.to_string(),
            kind,
            challenge: challenge.clone(),
            issued_at,
        };

        if self
            .entries
            .insert((username.to_string(), kind), entry)
            .is_some()
        {
            tracing::debug!(username, %kind, "superseded unconsumed challenge");
        }

        challenge
    }

    /// Remove the entry for `(username, kind)` and check it against the value
    /// the client presented.
    pub fn consume(
        &self,
        username: &str,
        kind: CeremonyKind,
        presented: &Challenge,
    ) -> AppResult<ChallengeEntry> {
        self.consume_at(username, kind, presented, Utc::now())
    }

    pub(crate) fn consume_at(
        &self,
        username: &str,
        kind: CeremonyKind,
        presented: &Challenge,
        now: DateTime<Utc>,
    ) -> AppResult<ChallengeEntry> {
        let (_, entry) = self
            .entries
            .remove(&(username.to_string(), kind))
            .ok_or_else(|| {
                AppError::ChallengeMissing(format!("no {kind} challenge for user '{username}'"))
            })?;

        let stored = entry.challenge.as_bytes();
        if !bool::from(stored.ct_eq(presented.as_bytes())) {
            return Err(AppError::ChallengeMismatch(format!(
                "{kind} challenge mismatch for user '{username}'"
            )));
        }

        if self.is_expired(&entry, now) {
            return Err(AppError::ChallengeExpired(format!(
                "{kind} challenge for user '{username}' issued at {}",
                entry.issued_at.to_rfc3339()
            )));
        }

        Ok(entry)
    }

    /// Drop every entry past its maximum age. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub(crate) fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        if self.max_age.is_none() {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &ChallengeEntry, now: DateTime<Utc>) -> bool {
        match self.max_age {
            Some(max_age) => now - entry.issued_at > max_age,
            None => false,
        }
    }
}
