use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    /// Upper bound for each verifier store call.
    pub store_timeout: Duration,
    /// Consume the stored verifier on rotation so a refresh token works at most once.
    pub single_use_refresh: bool,
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        AuthServiceConfig {
            store_timeout: Duration::from_secs(2),
            single_use_refresh: false,
        }
    }
}

pub struct RealAuthService {
    token_codec: Arc<dyn TokenCodec>,
    verifier_hasher: Arc<dyn VerifierHasher>,
    verifier_store: Arc<dyn VerifierStore>,
    cfg: AuthServiceConfig,
}

impl RealAuthService {
    pub fn new(
        token_codec: Arc<dyn TokenCodec>,
        verifier_hasher: Arc<dyn VerifierHasher>,
        verifier_store: Arc<dyn VerifierStore>,
        cfg: AuthServiceConfig,
    ) -> Self {
        Self {
            token_codec,
            verifier_hasher,
            verifier_store,
            cfg,
        }
    }

    fn ttl_secs(until: DateTime<Utc>) -> u64 {
        let now = Utc::now();
        let secs = (until - now).num_seconds();
        if secs <= 0 { 1 } else { secs as u64 }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, VerifierStoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.cfg.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(VerifierStoreError::NotFound)) => Err(AuthError::SessionNotFound),
            Ok(Err(VerifierStoreError::Timeout)) | Err(_) => Err(AuthError::Timeout { op }),
            Ok(Err(VerifierStoreError::Unavailable(message))) => {
                Err(AuthError::PersistenceUnavailable { op, message })
            }
            Ok(Err(VerifierStoreError::Corrupt(message))) => {
                Err(AuthError::InternalError(format!("{op}: {message}")))
            }
        }
    }

    /// Fresh pair for a new session plus the verifier record that backs it.
    /// Nothing is persisted here.
    async fn mint(
        &self,
        subject: &SubjectId,
    ) -> Result<(AuthTokens, VerifierRecord, u64), AuthError> {
        let binding = SessionBinding {
            subject: subject.clone(),
            session_id: SessionId::new(),
        };

        let access = self.token_codec.create_token(TokenKind::Access, &binding)?;
        let refresh = self.token_codec.create_token(TokenKind::Refresh, &binding)?;

        let verifier = self.verifier_hasher.hash_token(&refresh.token).await?;
        let record = VerifierRecord {
            subject: binding.subject,
            session_id: binding.session_id,
            verifier,
            created_at: Utc::now(),
        };
        let ttl_secs = Self::ttl_secs(refresh.claims.expires_at);

        let tokens = AuthTokens {
            access_token: AccessToken(access.token),
            refresh_token: RefreshToken(refresh.token),
            access_token_expires_at: access.claims.expires_at,
            refresh_token_expires_at: refresh.claims.expires_at,
        };
        Ok((tokens, record, ttl_secs))
    }

    fn reject(subject: &SubjectId, session_id: SessionId, err: AuthError) -> AuthError {
        warn!(%subject, %session_id, error = %err, "possible refresh token theft or reuse");
        err
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn issue_tokens(&self, subject: &SubjectId) -> Result<AuthTokens, AuthError> {
        let (tokens, record, ttl_secs) = self.mint(subject).await?;
        self.bounded(
            "store verifier",
            self.verifier_store.store_verifier(&record, ttl_secs),
        )
        .await?;

        debug!(subject = %record.subject, session_id = %record.session_id, "issued token pair");
        Ok(tokens)
    }

    async fn refresh_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<AuthTokens, AuthError> {
        let access = self
            .token_codec
            .parse_and_validate(TokenKind::Access, access_token)?;
        let refresh = self
            .token_codec
            .parse_and_validate(TokenKind::Refresh, refresh_token)?;

        if refresh.subject != access.subject {
            return Err(Self::reject(
                &refresh.subject,
                refresh.session_id,
                AuthError::SubjectMismatch,
            ));
        }
        if refresh.session_id != access.session_id {
            return Err(Self::reject(
                &refresh.subject,
                refresh.session_id,
                AuthError::SessionMismatch,
            ));
        }

        let stored = self
            .bounded(
                "lookup verifier",
                self.verifier_store
                    .lookup_verifier(refresh.session_id, &refresh.subject),
            )
            .await?;

        let matches = self
            .verifier_hasher
            .verify_token(refresh_token, &stored.verifier)
            .await?;
        if !matches {
            return Err(Self::reject(
                &refresh.subject,
                refresh.session_id,
                AuthError::TokenMismatch,
            ));
        }

        let tokens = if self.cfg.single_use_refresh {
            let (tokens, record, ttl_secs) = self.mint(&access.subject).await?;
            self.bounded(
                "rotate verifier",
                self.verifier_store
                    .rotate_verifier(&stored, &record, ttl_secs),
            )
            .await?;
            tokens
        } else {
            self.issue_tokens(&access.subject).await?
        };

        info!(subject = %access.subject, rotated_session_id = %access.session_id, "rotated token pair");
        Ok(tokens)
    }
}
