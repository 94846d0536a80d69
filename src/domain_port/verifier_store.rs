use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct VerifierRecord {
    pub subject: SubjectId,
    pub session_id: SessionId,
    pub verifier: RefreshVerifier,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifierStoreError {
    #[error("verifier not found")]
    NotFound,
    #[error("store timed out")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait::async_trait]
pub trait VerifierStore: Send + Sync {
    /// Persist a verifier for `ttl_secs`. A later write for the same
    /// (session, subject) replaces the earlier one.
    async fn store_verifier(
        &self,
        record: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<(), VerifierStoreError>;

    async fn lookup_verifier(
        &self,
        session_id: SessionId,
        subject: &SubjectId,
    ) -> Result<VerifierRecord, VerifierStoreError>;

    /// Atomically replace `previous` with `next`. Fails with `NotFound` when
    /// `previous` is gone, expired, or no longer holds the same verifier; the
    /// store is left untouched in that case. At most one concurrent caller
    /// rotates a given record.
    async fn rotate_verifier(
        &self,
        previous: &VerifierRecord,
        next: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<(), VerifierStoreError>;

    /// Drop expired records and report how many went. Stores with native
    /// expiry have nothing to do.
    async fn purge_expired(&self) -> Result<u64, VerifierStoreError> {
        Ok(0)
    }
}
