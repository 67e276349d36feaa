pub mod server;

use secrecy::SecretString;

/// Actions the CLI can dispatch.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        session_secret: SecretString,
        frontend_base_url: String,
        password_hash_cost: u32,
        reset_token_ttl_ms: i64,
        verification_token_ttl_ms: i64,
        session_ttl_seconds: i64,
    },
}
