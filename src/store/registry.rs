//! # Credential Registry
//!
//! In-memory mapping from username to subject, and from (subject, credential
//! id) to an enrolled passkey. Knows nothing about challenges or signatures.
//!
//! ## Locking
//! Subjects are sharded across a `DashMap`, so ceremonies for different users
//! never contend on one global lock. Each subject carries its own `RwLock`
//! around the credential list: writers for the same user are serialized,
//! readers proceed concurrently.

use crate::error::{AppError, AppResult};
use crate::store::models::{
    CredentialDescriptor, CredentialId, CredentialRecord, Subject,
};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

struct SubjectEntry {
    subject: Subject,
    /// Insertion ordered; credential sets per user are small
    credentials: RwLock<Vec<CredentialRecord>>,
}

#[derive(Default)]
pub struct CredentialRegistry {
    subjects: DashMap<String, Arc<SubjectEntry>>,
    /// credential id -> owning username
    owners: DashMap<CredentialId, String>,
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the subject registered under `username`, creating it if absent.
    ///
    /// The shard lock held by the entry API makes check-and-insert atomic:
    /// concurrent callers with the same username all observe one subject id.
    /// `display_name` only matters for the call that creates the subject.
    pub fn get_or_create(&self, username: &str, display_name: &str) -> Subject {
        let entry = self
            .subjects
            .entry(username.to_string())
            .or_insert_with(|| {
                tracing::debug!(username, "creating subject");
                Arc::new(SubjectEntry {
                    subject: Subject::new(username.to_string(), display_name.to_string()),
                    credentials: RwLock::new(Vec::new()),
                })
            });
        entry.subject.clone()
    }

    pub fn get_required(&self, username: &str) -> AppResult<Subject> {
        Ok(self.entry(username)?.subject.clone())
    }

    /// Enroll a credential for `username`
    ///
    /// Re-registering a credential id the subject already owns replaces the
    /// stored record in place. A credential id owned by another subject is
    /// rejected.
    pub fn add_credential(&self, username: &str, record: CredentialRecord) -> AppResult<()> {
        let entry = self.entry(username)?;
        let mut credentials = entry.credentials.write();

        match self.owners.entry(record.credential_id.clone()) {
            Entry::Occupied(owner) if owner.get() != username => {
                return Err(AppError::DuplicateCredential(record.credential_id.to_string()));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(vacant) => {
                vacant.insert(username.to_string());
            }
        }

        match credentials
            .iter_mut()
            .find(|existing| existing.credential_id == record.credential_id)
        {
            Some(existing) => *existing = record,
            None => credentials.push(record),
        }

        Ok(())
    }

    pub fn get_credential(
        &self,
        username: &str,
        credential_id: &CredentialId,
    ) -> AppResult<CredentialRecord> {
        let entry = self.entry(username)?;
        let credentials = entry.credentials.read();
        credentials
            .iter()
            .find(|record| &record.credential_id == credential_id)
            .cloned()
            .ok_or_else(|| unknown_credential(username, credential_id))
    }

    /// Descriptors for every credential of `username`, in enrollment order
    pub fn list_credential_descriptors(
        &self,
        username: &str,
    ) -> AppResult<Vec<CredentialDescriptor>> {
        let entry = self.entry(username)?;
        let credentials = entry.credentials.read();
        Ok(credentials.iter().map(CredentialRecord::descriptor).collect())
    }

    /// Overwrite the stored signature counter.
    ///
    /// No monotonicity check happens here; the authentication ceremony
    /// compares counters before calling this.
    pub fn update_counter(
        &self,
        username: &str,
        credential_id: &CredentialId,
        new_counter: u32,
    ) -> AppResult<()> {
        let entry = self.entry(username)?;
        let mut credentials = entry.credentials.write();
        let record = credentials
            .iter_mut()
            .find(|record| &record.credential_id == credential_id)
            .ok_or_else(|| unknown_credential(username, credential_id))?;

        record.counter = new_counter;
        record.last_used_at = Some(Utc::now());
        Ok(())
    }

    /// Store `presented` only if it is strictly greater than the stored counter.
    ///
    /// Check and write happen under the subject's write lock, so overlapping
    /// authentications for one credential can never move the counter backwards.
    /// Fails with `CounterReplaySuspected` and leaves the record untouched otherwise.
    pub fn advance_counter(
        &self,
        username: &str,
        credential_id: &CredentialId,
        presented: u32,
    ) -> AppResult<()> {
        let entry = self.entry(username)?;
        let mut credentials = entry.credentials.write();
        let record = credentials
            .iter_mut()
            .find(|record| &record.credential_id == credential_id)
            .ok_or_else(|| unknown_credential(username, credential_id))?;

        if presented <= record.counter {
            return Err(AppError::CounterReplaySuspected {
                stored: record.counter,
                presented,
            });
        }

        record.counter = presented;
        record.last_used_at = Some(Utc::now());
        Ok(())
    }

    pub fn credential_count(&self, username: &str) -> AppResult<usize> {
        Ok(self.entry(username)?.credentials.read().len())
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    // Clone the Arc out so no shard guard is held while the subject lock is taken.
    fn entry(&self, username: &str) -> AppResult<Arc<SubjectEntry>> {
        self.subjects
            .get(username)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::SubjectNotFound(username.to_string()))
    }
}

fn unknown_credential(username: &str, credential_id: &CredentialId) -> AppError {
    AppError::UnknownCredential(format!("{credential_id} for user '{username}'"))
}
