//! One-way hashing for long-lived secrets (passwords, OTP codes).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(argon2::Error),
    #[error("failed to hash secret: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("malformed secret digest: {0}")]
    MalformedDigest(argon2::password_hash::Error),
}

/// Argon2id hasher with a configurable cost. The produced PHC string embeds
/// its own salt and parameters, so verification needs nothing but the digest.
pub struct SecretHasher {
    argon2: Argon2<'static>,
}

impl SecretHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(PasswordError::InvalidParams)?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(PasswordError::Hash)?;
        Ok(digest.to_string())
    }

    /// A mismatch is `Ok(false)`; only a digest that cannot be parsed or
    /// processed is an error.
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(digest).map_err(PasswordError::MalformedDigest)?;
        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedDigest(e)),
        }
    }
}
