use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token kind: {0}")]
    InvalidTokenKind(String),
    #[error("{kind} expired")]
    TokenExpired { kind: TokenKind },
    #[error("expected {expected}, found {found}")]
    TokenKindMismatch { expected: TokenKind, found: String },
    #[error("{kind} invalid: {reason}")]
    TokenInvalid { kind: TokenKind, reason: String },
    #[error("subject mismatch between access and refresh tokens")]
    SubjectMismatch,
    #[error("session mismatch between access and refresh tokens")]
    SessionMismatch,
    #[error("session not found")]
    SessionNotFound,
    #[error("refresh token does not match stored verifier")]
    TokenMismatch,
    #[error("persistence unavailable during {op}: {message}")]
    PersistenceUnavailable { op: &'static str, message: String },
    #[error("{op} timed out")]
    Timeout { op: &'static str },
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Both tokens were well formed but do not belong together or to the stored session.
    /// These point at token theft or replay rather than staleness.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            AuthError::SubjectMismatch | AuthError::SessionMismatch | AuthError::TokenMismatch
        )
    }
}

impl From<UnknownTokenKind> for AuthError {
    fn from(err: UnknownTokenKind) -> Self {
        AuthError::InvalidTokenKind(err.0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// A freshly signed token together with the claims it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

pub trait TokenCodec: Send + Sync {
    fn create_token(&self, kind: TokenKind, binding: &SessionBinding)
    -> Result<IssuedToken, AuthError>;
    fn parse_and_validate(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, AuthError>;
}

#[async_trait::async_trait]
pub trait VerifierHasher: Send + Sync {
    async fn hash_token(&self, refresh_token: &str) -> Result<RefreshVerifier, AuthError>;
    async fn verify_token(
        &self,
        refresh_token: &str,
        verifier: &RefreshVerifier,
    ) -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Mint a pair bound to a new session for an already-authenticated subject.
    async fn issue_tokens(&self, subject: &SubjectId) -> Result<AuthTokens, AuthError>;
    /// Exchange a valid pair for a new pair bound to a new session.
    async fn refresh_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<AuthTokens, AuthError>;
}
