//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action the binary should execute.

use crate::cli::actions::Action;
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
///
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server {
        port,
        dsn,
        session_secret: auth_opts.session_secret,
        frontend_base_url: auth_opts.frontend_base_url,
        password_hash_cost: auth_opts.password_hash_cost,
        reset_token_ttl_ms: auth_opts.reset_token_ttl_ms,
        verification_token_ttl_ms: auth_opts.verification_token_ttl_ms,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
    })
}
