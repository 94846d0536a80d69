use crate::domain_model::{SessionId, SubjectId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Name carried in the `typ` header of a signed token.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => ACCESS_TOKEN,
            TokenKind::Refresh => REFRESH_TOKEN,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("unrecognized token kind: {0}")]
pub struct UnknownTokenKind(pub String);

impl std::str::FromStr for TokenKind {
    type Err = UnknownTokenKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ACCESS_TOKEN => Ok(TokenKind::Access),
            REFRESH_TOKEN => Ok(TokenKind::Refresh),
            other => Err(UnknownTokenKind(other.to_owned())),
        }
    }
}

/// Decoded content of a signed token. Timestamps have whole-second precision.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TokenClaims {
    pub subject: SubjectId,
    pub session_id: SessionId,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            assert_eq!(kind.as_str().parse::<TokenKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "id_token".parse::<TokenKind>().unwrap_err();
        assert_eq!(err, UnknownTokenKind("id_token".to_string()));
    }
}
