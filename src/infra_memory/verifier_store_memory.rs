use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

type Key = (SessionId, SubjectId);

struct Entry {
    record: VerifierRecord,
    expire_at: DateTime<Utc>,
}

/// Process-local store. Entries vanish on restart.
#[derive(Default)]
pub struct MemoryVerifierStore {
    entries: DashMap<Key, Entry>,
}

impl MemoryVerifierStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn key(session_id: SessionId, subject: &SubjectId) -> Key {
        (session_id, subject.clone())
    }

    fn entry(record: &VerifierRecord, ttl_secs: u64) -> Result<Entry, VerifierStoreError> {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| VerifierStoreError::Corrupt(format!("ttl out of range: {ttl_secs}")))?;
        let expire_at = record
            .created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Ok(Entry {
            record: record.clone(),
            expire_at,
        })
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries.iter().filter(|e| e.expire_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl VerifierStore for MemoryVerifierStore {
    async fn store_verifier(
        &self,
        record: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<(), VerifierStoreError> {
        let entry = Self::entry(record, ttl_secs)?;
        self.entries
            .insert(Self::key(record.session_id, &record.subject), entry);
        Ok(())
    }

    async fn lookup_verifier(
        &self,
        session_id: SessionId,
        subject: &SubjectId,
    ) -> Result<VerifierRecord, VerifierStoreError> {
        let key = Self::key(session_id, subject);
        let now = Utc::now();
        let found = self
            .entries
            .get(&key)
            .map(|entry| (entry.expire_at > now).then(|| entry.record.clone()));

        match found {
            Some(Some(record)) => Ok(record),
            Some(None) => {
                self.entries.remove_if(&key, |_, entry| entry.expire_at <= now);
                Err(VerifierStoreError::NotFound)
            }
            None => Err(VerifierStoreError::NotFound),
        }
    }

    async fn rotate_verifier(
        &self,
        previous: &VerifierRecord,
        next: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<(), VerifierStoreError> {
        let entry = Self::entry(next, ttl_secs)?;
        let now = Utc::now();
        self.entries
            .remove_if(&Self::key(previous.session_id, &previous.subject), |_, e| {
                e.expire_at > now && e.record.verifier == previous.verifier
            })
            .ok_or(VerifierStoreError::NotFound)?;

        self.entries
            .insert(Self::key(next.session_id, &next.subject), entry);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, VerifierStoreError> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expire_at > now);
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(subject: &str, verifier: &str) -> VerifierRecord {
        VerifierRecord {
            subject: SubjectId::from(subject),
            session_id: SessionId::new(),
            verifier: RefreshVerifier(verifier.to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn stored_verifier_is_found_by_session_and_subject() {
        let store = MemoryVerifierStore::new();
        let rec = record("1", "v1");
        store.store_verifier(&rec, 60).await.unwrap();

        let found = store
            .lookup_verifier(rec.session_id, &rec.subject)
            .await
            .unwrap();
        assert_eq!(found.verifier, rec.verifier);

        let other_subject = store
            .lookup_verifier(rec.session_id, &SubjectId::from("2"))
            .await;
        assert!(matches!(other_subject, Err(VerifierStoreError::NotFound)));
    }

    #[tokio::test]
    async fn later_write_replaces_earlier_one() {
        let store = MemoryVerifierStore::new();
        let first = record("1", "v1");
        let second = VerifierRecord {
            verifier: RefreshVerifier("v2".to_string()),
            ..first.clone()
        };
        store.store_verifier(&first, 60).await.unwrap();
        store.store_verifier(&second, 60).await.unwrap();

        let found = store
            .lookup_verifier(first.session_id, &first.subject)
            .await
            .unwrap();
        assert_eq!(found.verifier.as_str(), "v2");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn expired_records_are_not_found() {
        let store = MemoryVerifierStore::new();
        let rec = record("1", "v1");
        store.store_verifier(&rec, 0).await.unwrap();

        let result = store.lookup_verifier(rec.session_id, &rec.subject).await;
        assert!(matches!(result, Err(VerifierStoreError::NotFound)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn rotation_swaps_previous_for_next() {
        let store = MemoryVerifierStore::new();
        let previous = record("1", "v1");
        let next = record("1", "v2");
        store.store_verifier(&previous, 60).await.unwrap();

        store.rotate_verifier(&previous, &next, 60).await.unwrap();

        let gone = store
            .lookup_verifier(previous.session_id, &previous.subject)
            .await;
        assert!(matches!(gone, Err(VerifierStoreError::NotFound)));
        let found = store
            .lookup_verifier(next.session_id, &next.subject)
            .await
            .unwrap();
        assert_eq!(found.verifier.as_str(), "v2");
    }

    #[tokio::test]
    async fn rotation_happens_once_under_contention() {
        let store = Arc::new(MemoryVerifierStore::new());
        let previous = record("1", "v1");
        let (left, right) = (record("1", "left"), record("1", "right"));
        store.store_verifier(&previous, 60).await.unwrap();

        let (a, b) = tokio::join!(
            store.rotate_verifier(&previous, &left, 60),
            store.rotate_verifier(&previous, &right, 60),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn rotation_refuses_a_changed_verifier() {
        let store = MemoryVerifierStore::new();
        let previous = record("1", "v1");
        let replaced = VerifierRecord {
            verifier: RefreshVerifier("other".to_string()),
            ..previous.clone()
        };
        let next = record("1", "v2");
        store.store_verifier(&replaced, 60).await.unwrap();

        let result = store.rotate_verifier(&previous, &next, 60).await;
        assert!(matches!(result, Err(VerifierStoreError::NotFound)));

        let kept = store
            .lookup_verifier(previous.session_id, &previous.subject)
            .await
            .unwrap();
        assert_eq!(kept.verifier.as_str(), "other");
        let absent = store.lookup_verifier(next.session_id, &next.subject).await;
        assert!(matches!(absent, Err(VerifierStoreError::NotFound)));
    }

    #[tokio::test]
    async fn purge_drops_expired_entries() {
        let store = MemoryVerifierStore::new();
        for i in 0..1000 {
            store
                .store_verifier(&record(&i.to_string(), "v"), 0)
                .await
                .unwrap();
        }
        let live = record("live", "v");
        store.store_verifier(&live, 60).await.unwrap();
        assert_eq!(store.entries.len(), 1001);

        let purged = store.purge_expired().await.unwrap();

        assert_eq!(purged, 1000);
        assert_eq!(store.entries.len(), 1);
        assert!(store.lookup_verifier(live.session_id, &live.subject).await.is_ok());
    }
}
