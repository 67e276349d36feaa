use crate::{api, auth::AuthConfig, cli::actions::Action};
use anyhow::Result;

/// Execute the server action.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        dsn,
        session_secret,
        frontend_base_url,
        password_hash_cost,
        reset_token_ttl_ms,
        verification_token_ttl_ms,
        session_ttl_seconds,
    } = action;

    let config = AuthConfig::new(session_secret, frontend_base_url)
        .with_password_hash_cost(password_hash_cost)
        .with_reset_token_ttl_ms(reset_token_ttl_ms)
        .with_verification_token_ttl_ms(verification_token_ttl_ms)
        .with_session_ttl_seconds(session_ttl_seconds);

    api::serve(port, dsn, config).await
}
