//! Opaque one-time token generation and digesting.
//!
//! Reset and verification tokens are high-entropy random values, so a fast
//! deterministic digest is enough for at-rest storage and enables store-side
//! lookup by hash without a linear scan. Passwords get the opposite treatment
//! (salted + slow) in [`super::password`].

use anyhow::{Context, Result};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Number of random bytes per opaque token (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// Generate a new opaque token: 32 random bytes as lowercase hex.
///
/// Callers distinguish purpose (reset vs. verification) by the field they
/// store the digest in, not by token shape.
///
/// # Errors
///
/// Returns an error if the OS random source is unavailable.
pub fn generate_opaque_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate opaque token")?;
    Ok(hex::encode(bytes))
}

/// Deterministic SHA-256 digest of a token, as lowercase hex.
///
/// Raw tokens are only ever sent to the account's email address; the store
/// sees this digest exclusively.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_token_is_64_lowercase_hex_chars() -> Result<()> {
        let token = generate_opaque_token()?;
        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        Ok(())
    }

    #[test]
    fn opaque_tokens_do_not_repeat() -> Result<()> {
        let first = generate_opaque_token()?;
        let second = generate_opaque_token()?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn hash_token_is_deterministic_and_input_sensitive() {
        let first = hash_token("token");
        let second = hash_token("token");
        let different = hash_token("tokeN");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn hash_token_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            hash_token(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
