use crate::application_port::*;
use crate::domain_model::RefreshVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Argon2Config {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Hashes a SHA-256 digest of the refresh token rather than the token itself,
/// so the hashed input has a fixed length whatever the token size.
pub struct Argon2VerifierHasher {
    argon2: Argon2<'static>,
}

impl Argon2VerifierHasher {
    pub fn new(cfg: &Argon2Config) -> Result<Self, AuthError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| AuthError::InternalError(format!("argon2 params: {e}")))?;
        Ok(Argon2VerifierHasher {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    #[inline]
    fn digest(token: &str) -> Vec<u8> {
        Sha256::digest(token.as_bytes()).to_vec()
    }
}

#[async_trait::async_trait]
impl VerifierHasher for Argon2VerifierHasher {
    async fn hash_token(&self, refresh_token: &str) -> Result<RefreshVerifier, AuthError> {
        let argon2 = self.argon2.clone();
        let digest = Self::digest(refresh_token);

        let phc = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(&digest, &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| AuthError::InternalError(format!("hash task: {e}")))?
        .map_err(|e| AuthError::InternalError(format!("hash error: {e}")))?;

        Ok(RefreshVerifier(phc))
    }

    async fn verify_token(
        &self,
        refresh_token: &str,
        verifier: &RefreshVerifier,
    ) -> Result<bool, AuthError> {
        let argon2 = self.argon2.clone();
        let digest = Self::digest(refresh_token);
        let phc = verifier.0.clone();

        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&phc)
                .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {e}")))?;
            match argon2.verify_password(&digest, &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(AuthError::InternalError(format!("verify error: {e}"))),
            }
        })
        .await
        .map_err(|e| AuthError::InternalError(format!("verify task: {e}")))?
    }
}

#[cfg(test)]
pub fn cheap_hasher() -> Argon2VerifierHasher {
    Argon2VerifierHasher::new(&Argon2Config {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}
