//! Auth configuration.

use secrecy::{ExposeSecret, SecretString};

const DEFAULT_PASSWORD_HASH_COST: u32 = 3;
const DEFAULT_RESET_TOKEN_TTL_MS: i64 = 60 * 60 * 1000;
const DEFAULT_VERIFICATION_TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60;

/// Configuration consumed by [`super::AuthService`].
///
/// Token TTLs are milliseconds; the session TTL is seconds because it maps
/// directly onto the token's `exp` claim.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_secret: SecretString,
    frontend_base_url: String,
    password_hash_cost: u32,
    reset_token_ttl_ms: i64,
    verification_token_ttl_ms: i64,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(session_secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            session_secret,
            frontend_base_url,
            password_hash_cost: DEFAULT_PASSWORD_HASH_COST,
            reset_token_ttl_ms: DEFAULT_RESET_TOKEN_TTL_MS,
            verification_token_ttl_ms: DEFAULT_VERIFICATION_TOKEN_TTL_MS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_password_hash_cost(mut self, cost: u32) -> Self {
        self.password_hash_cost = cost;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.reset_token_ttl_ms = ttl_ms;
        self
    }

    #[must_use]
    pub fn with_verification_token_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.verification_token_ttl_ms = ttl_ms;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    pub(crate) fn session_secret_bytes(&self) -> &[u8] {
        self.session_secret.expose_secret().as_bytes()
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn password_hash_cost(&self) -> u32 {
        self.password_hash_cost
    }

    #[must_use]
    pub fn reset_token_ttl_ms(&self) -> i64 {
        self.reset_token_ttl_ms
    }

    #[must_use]
    pub fn verification_token_ttl_ms(&self) -> i64 {
        self.verification_token_ttl_ms
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }
}
