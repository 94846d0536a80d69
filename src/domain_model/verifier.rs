use std::fmt;

/// PHC-formatted salted hash of a refresh token digest. The raw token is never stored.
#[derive(Clone, Eq, PartialEq)]
pub struct RefreshVerifier(pub String);

impl RefreshVerifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RefreshVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshVerifier(..)")
    }
}
