use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub struct JwtConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Grace period applied to `exp` when validating.
    pub leeway: Duration,
    pub signing_key: Vec<u8>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway", &self.leeway)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    sid: String,
    iat: i64,
    exp: i64,
}

/// Signs with HS512; the token kind travels in the `typ` header.
pub struct JwtHs512Codec {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtHs512Codec {
    pub fn new(cfg: JwtConfig) -> Result<Self, AuthError> {
        if cfg.signing_key.is_empty() {
            return Err(AuthError::InternalError("empty signing key".to_string()));
        }

        // Only the HMAC family is accepted. Expiry is checked by hand after the kind check.
        let mut validation = Validation::new(Algorithm::HS512);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(JwtHs512Codec {
            encoding_key: EncodingKey::from_secret(&cfg.signing_key),
            decoding_key: DecodingKey::from_secret(&cfg.signing_key),
            validation,
            cfg,
        })
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        }
    }

    #[inline]
    fn to_datetime(secs: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0)
    }

    fn describe(err: &jsonwebtoken::errors::Error) -> String {
        match err.kind() {
            ErrorKind::InvalidSignature => "bad signature".to_string(),
            ErrorKind::InvalidAlgorithm => "unexpected signing algorithm".to_string(),
            ErrorKind::MissingRequiredClaim(claim) => format!("missing claim {claim}"),
            _ => err.to_string(),
        }
    }
}

impl TokenCodec for JwtHs512Codec {
    fn create_token(
        &self,
        kind: TokenKind,
        binding: &SessionBinding,
    ) -> Result<IssuedToken, AuthError> {
        let iat = Utc::now().timestamp();
        let exp = i64::try_from(self.ttl(kind).as_secs())
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or_else(|| AuthError::InternalError(format!("{kind} lifetime overflows")))?;
        let (issued_at, expires_at) = Self::to_datetime(iat)
            .zip(Self::to_datetime(exp))
            .ok_or_else(|| AuthError::InternalError(format!("{kind} lifetime out of range")))?;

        let claims = SessionClaims {
            sub: binding.subject.0.clone(),
            sid: binding.session_id.to_string(),
            iat,
            exp,
        };
        let mut header = Header::new(Algorithm::HS512);
        header.typ = Some(kind.as_str().to_string());

        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        Ok(IssuedToken {
            token,
            claims: TokenClaims {
                subject: binding.subject.clone(),
                session_id: binding.session_id,
                kind,
                issued_at,
                expires_at,
            },
        })
    }

    fn parse_and_validate(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| AuthError::TokenInvalid {
                kind,
                reason: Self::describe(&e),
            },
        )?;

        let claims = data.claims;
        let leeway = i64::try_from(self.cfg.leeway.as_secs()).unwrap_or(i64::MAX);
        if Utc::now().timestamp() >= claims.exp.saturating_add(leeway) {
            return Err(AuthError::TokenExpired { kind });
        }

        let found = data.header.typ.as_deref().unwrap_or("none");
        match found.parse::<TokenKind>() {
            Ok(actual) if actual == kind => {}
            _ => {
                return Err(AuthError::TokenKindMismatch {
                    expected: kind,
                    found: found.to_string(),
                });
            }
        }

        let invalid = |reason: String| AuthError::TokenInvalid { kind, reason };
        let session_id = claims
            .sid
            .parse::<SessionId>()
            .map_err(|e| invalid(format!("session id: {e}")))?;
        let issued_at =
            Self::to_datetime(claims.iat).ok_or_else(|| invalid("iat out of range".to_string()))?;
        let expires_at =
            Self::to_datetime(claims.exp).ok_or_else(|| invalid("exp out of range".to_string()))?;

        Ok(TokenClaims {
            subject: SubjectId(claims.sub),
            session_id,
            kind,
            issued_at,
            expires_at,
        })
    }
}
