use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, Script};
use std::collections::HashMap;

const VERIFIER_ROTATE: &str = include_str!("verifier_rotate.lua");

const FIELD_VERIFIER: &str = "verifier";
const FIELD_CREATED_AT: &str = "created_at";

/// One hash per (session, subject) holding the verifier and its creation time.
/// The key expires together with the refresh token.
pub struct RedisVerifierStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisVerifierStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisVerifierStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, session_id: SessionId, subject: &SubjectId) -> String {
        verifier_key(&self.prefix, session_id, subject)
    }

    fn store_error(e: RedisError) -> VerifierStoreError {
        if e.is_timeout() {
            VerifierStoreError::Timeout
        } else {
            VerifierStoreError::Unavailable(e.to_string())
        }
    }
}

fn verifier_key(prefix: &str, session_id: SessionId, subject: &SubjectId) -> String {
    format!("{}:{}:{}", prefix, session_id, subject)
}

fn to_record(
    session_id: SessionId,
    subject: &SubjectId,
    verifier: Option<String>,
    created_at: Option<String>,
) -> Result<VerifierRecord, VerifierStoreError> {
    let verifier = verifier.ok_or(VerifierStoreError::NotFound)?;
    let created_at = created_at
        .ok_or_else(|| VerifierStoreError::Corrupt("missing created_at".to_string()))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| VerifierStoreError::Corrupt(format!("created_at: {e}")))?
        .with_timezone(&Utc);

    Ok(VerifierRecord {
        subject: subject.clone(),
        session_id,
        verifier: RefreshVerifier(verifier),
        created_at,
    })
}

#[async_trait::async_trait]
impl VerifierStore for RedisVerifierStore {
    async fn store_verifier(
        &self,
        record: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<(), VerifierStoreError> {
        let key = self.key(record.session_id, &record.subject);
        let created_at = record.created_at.to_rfc3339();
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(
                &key,
                &[
                    (FIELD_VERIFIER, record.verifier.as_str()),
                    (FIELD_CREATED_AT, created_at.as_str()),
                ],
            )
            .ignore()
            .expire(&key, ttl)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Self::store_error)?;
        Ok(())
    }

    async fn lookup_verifier(
        &self,
        session_id: SessionId,
        subject: &SubjectId,
    ) -> Result<VerifierRecord, VerifierStoreError> {
        let key = self.key(session_id, subject);
        let mut conn = self.conn.clone();
        let mut fields: HashMap<String, String> =
            conn.hgetall(&key).await.map_err(Self::store_error)?;

        to_record(
            session_id,
            subject,
            fields.remove(FIELD_VERIFIER),
            fields.remove(FIELD_CREATED_AT),
        )
    }

    async fn rotate_verifier(
        &self,
        previous: &VerifierRecord,
        next: &VerifierRecord,
        ttl_secs: u64,
    ) -> Result<(), VerifierStoreError> {
        let mut conn = self.conn.clone();
        let script = Script::new(VERIFIER_ROTATE);
        let rotated: i64 = script
            .key(self.key(previous.session_id, &previous.subject))
            .key(self.key(next.session_id, &next.subject))
            .arg(previous.verifier.as_str())
            .arg(next.verifier.as_str())
            .arg(next.created_at.to_rfc3339())
            .arg(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::store_error)?;

        match rotated {
            1 => Ok(()),
            _ => Err(VerifierStoreError::NotFound),
        }
    }
}
