//! One-way password hashing and verification.

use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};

use super::error::AuthError;

/// Salted, adaptive password hasher (Argon2id) with a configurable work
/// factor. Two hashes of the same input never match; round trips must go
/// through [`CredentialHasher::verify`].
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Build a hasher with the given iteration count (t_cost). Memory and
    /// parallelism stay at the crate defaults; the cost lives inside each PHC
    /// string, so existing hashes keep verifying after a cost change.
    ///
    /// # Errors
    ///
    /// Returns an error if the cost is outside the range Argon2 accepts.
    pub fn new(cost: u32) -> Result<Self> {
        let params = Params::new(Params::DEFAULT_M_COST, cost, Params::DEFAULT_P_COST, None)
            .map_err(|err| anyhow!("invalid password hash cost: {err}"))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password into a PHC string with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS random source is unavailable or hashing
    /// fails.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes)
            .map_err(|err| anyhow!("failed to generate salt: {err}"))?;
        let salt =
            SaltString::encode_b64(&salt_bytes).map_err(|err| anyhow!("invalid salt: {err}"))?;
        let phc = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|err| anyhow!("failed to hash password: {err}"))?
            .to_string();
        Ok(phc)
    }

    /// Verify a plaintext password against a stored PHC string.
    ///
    /// Mismatches return `Ok(false)`; a stored hash that cannot be parsed is
    /// unrecoverable corruption and surfaces as
    /// [`AuthError::CorruptCredential`]. The underlying comparison is
    /// constant-time at the library level.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CorruptCredential`] if the stored hash is
    /// malformed.
    pub fn verify(&self, plaintext: &str, stored: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(stored).map_err(|_| AuthError::CorruptCredential)?;
        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(_) => Err(AuthError::CorruptCredential),
        }
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}
