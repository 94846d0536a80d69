use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

const UPSERT_VERIFIER: &str = r#"
INSERT INTO refresh_verifier (session_id, subject_id, verifier, created_at, expire_at)
VALUES (?, ?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    verifier = VALUES(verifier),
    created_at = VALUES(created_at),
    expire_at = VALUES(expire_at)
"#;

/// Backed by the `refresh_verifier` table, see `schema/mysql.sql`.
pub struct MySqlVerifierStore {
    pool: MySqlPool,
}

impl MySqlVerifierStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlVerifierStore { pool }
    }

    #[inline]
    fn sid_as_bytes(id: &SessionId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn sid_from_bytes(id: &[u8]) -> Result<SessionId, VerifierStoreError> {
        Ok(SessionId(
            Uuid::from_slice(id).map_err(|e| VerifierStoreError::Corrupt(e.to_string()))?,
        ))
    }

    fn store_error(e: sqlx::Error) -> VerifierStoreError {
        match e {
            sqlx::Error::PoolTimedOut => VerifierStoreError::Timeout,
            e => VerifierStoreError::Unavailable(e.to_string()),
        }
    }

    fn expire_at(
        record: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<DateTime<Utc>, VerifierStoreError> {
        i64::try_from(ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| record.created_at.checked_add_signed(ttl))
            .ok_or_else(|| VerifierStoreError::Corrupt(format!("ttl out of range: {ttl_secs}")))
    }

    fn row_to_record(row: MySqlRow) -> Result<VerifierRecord, VerifierStoreError> {
        let corrupt = |e: sqlx::Error| VerifierStoreError::Corrupt(e.to_string());

        let session_id_bytes: Vec<u8> = row.try_get("session_id").map_err(corrupt)?;
        let session_id = Self::sid_from_bytes(&session_id_bytes)?;
        let subject: String = row.try_get("subject_id").map_err(corrupt)?;
        let verifier: String = row.try_get("verifier").map_err(corrupt)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;

        Ok(VerifierRecord {
            subject: SubjectId(subject),
            session_id,
            verifier: RefreshVerifier(verifier),
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl VerifierStore for MySqlVerifierStore {
    async fn store_verifier(
        &self,
        record: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<(), VerifierStoreError> {
        sqlx::query(UPSERT_VERIFIER)
            .bind(Self::sid_as_bytes(&record.session_id))
            .bind(record.subject.as_str())
            .bind(record.verifier.as_str())
            .bind(record.created_at)
            .bind(Self::expire_at(record, ttl_secs)?)
            .execute(&self.pool)
            .await
            .map_err(Self::store_error)?;

        Ok(())
    }

    async fn lookup_verifier(
        &self,
        session_id: SessionId,
        subject: &SubjectId,
    ) -> Result<VerifierRecord, VerifierStoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT session_id, subject_id, verifier, created_at
FROM refresh_verifier
WHERE session_id = ? AND subject_id = ? AND expire_at > ?
"#,
        )
        .bind(Self::sid_as_bytes(&session_id))
        .bind(subject.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::store_error)?;

        row_opt
            .map(Self::row_to_record)
            .transpose()?
            .ok_or(VerifierStoreError::NotFound)
    }

    async fn rotate_verifier(
        &self,
        previous: &VerifierRecord,
        next: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<(), VerifierStoreError> {
        let next_expire_at = Self::expire_at(next, ttl_secs)?;
        let mut tx = self.pool.begin().await.map_err(Self::store_error)?;

        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT verifier
FROM refresh_verifier
WHERE session_id = ? AND subject_id = ? AND expire_at > ?
FOR UPDATE
"#,
        )
        .bind(Self::sid_as_bytes(&previous.session_id))
        .bind(previous.subject.as_str())
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Self::store_error)?;

        let current: Option<String> = row_opt
            .map(|row| row.try_get::<String, _>("verifier"))
            .transpose()
            .map_err(|e| VerifierStoreError::Corrupt(e.to_string()))?;
        if current.as_deref() != Some(previous.verifier.as_str()) {
            tx.rollback().await.map_err(Self::store_error)?;
            return Err(VerifierStoreError::NotFound);
        }

        sqlx::query(
            r#"
DELETE FROM refresh_verifier
WHERE session_id = ? AND subject_id = ?
"#,
        )
        .bind(Self::sid_as_bytes(&previous.session_id))
        .bind(previous.subject.as_str())
        .execute(&mut *tx)
        .await
        .map_err(Self::store_error)?;

        sqlx::query(UPSERT_VERIFIER)
            .bind(Self::sid_as_bytes(&next.session_id))
            .bind(next.subject.as_str())
            .bind(next.verifier.as_str())
            .bind(next.created_at)
            .bind(next_expire_at)
            .execute(&mut *tx)
            .await
            .map_err(Self::store_error)?;

        tx.commit().await.map_err(Self::store_error)?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, VerifierStoreError> {
        let result = sqlx::query(
            r#"
DELETE FROM refresh_verifier
WHERE expire_at <= ?
"#,
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Self::store_error)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> VerifierRecord {
        VerifierRecord {
            subject: SubjectId::from("1"),
            session_id: SessionId::new(),
            verifier: RefreshVerifier("v".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn expiry_is_measured_from_creation() {
        let rec = record();
        let expire_at = MySqlVerifierStore::expire_at(&rec, 90).unwrap();
        assert_eq!((expire_at - rec.created_at).num_seconds(), 90);
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let result = MySqlVerifierStore::expire_at(&record(), u64::MAX);
        assert!(matches!(result, Err(VerifierStoreError::Corrupt(_))));
    }

    #[test]
    fn session_id_survives_binary_column() {
        let session_id = SessionId::new();
        let bytes = MySqlVerifierStore::sid_as_bytes(&session_id).to_vec();
        assert_eq!(MySqlVerifierStore::sid_from_bytes(&bytes).unwrap(), session_id);
    }
}
