//! Auth-related CLI arguments: session signing, token TTLs, hashing cost.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_PASSWORD_HASH_COST: &str = "password-hash-cost";
pub const ARG_RESET_TOKEN_TTL_MS: &str = "reset-token-ttl-ms";
pub const ARG_VERIFICATION_TOKEN_TTL_MS: &str = "verification-token-ttl-ms";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Symmetric secret used to sign session tokens (HS256)")
                .env("GATEHOUSE_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Frontend base URL used in email links and CORS origin")
                .env("GATEHOUSE_FRONTEND_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_PASSWORD_HASH_COST)
                .long(ARG_PASSWORD_HASH_COST)
                .help("Argon2id iteration count (t_cost) for password hashing")
                .env("GATEHOUSE_PASSWORD_HASH_COST")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL_MS)
                .long(ARG_RESET_TOKEN_TTL_MS)
                .help("Password reset token lifetime in milliseconds")
                .env("GATEHOUSE_RESET_TOKEN_TTL_MS")
                .default_value("3600000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_VERIFICATION_TOKEN_TTL_MS)
                .long(ARG_VERIFICATION_TOKEN_TTL_MS)
                .help("Email verification token lifetime in milliseconds")
                .env("GATEHOUSE_VERIFICATION_TOKEN_TTL_MS")
                .default_value("86400000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token lifetime in seconds")
                .env("GATEHOUSE_SESSION_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub session_secret: SecretString,
    pub frontend_base_url: String,
    pub password_hash_cost: u32,
    pub reset_token_ttl_ms: i64,
    pub verification_token_ttl_ms: i64,
    pub session_ttl_seconds: i64,
}

impl Options {
    /// # Errors
    ///
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let session_secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .cloned()
            .context("missing required argument: --session-secret")?;
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_URL)
            .cloned()
            .context("missing required argument: --frontend-url")?;

        Ok(Self {
            session_secret: SecretString::from(session_secret),
            frontend_base_url,
            password_hash_cost: matches
                .get_one::<u32>(ARG_PASSWORD_HASH_COST)
                .copied()
                .unwrap_or(3),
            reset_token_ttl_ms: matches
                .get_one::<i64>(ARG_RESET_TOKEN_TTL_MS)
                .copied()
                .unwrap_or(3_600_000),
            verification_token_ttl_ms: matches
                .get_one::<i64>(ARG_VERIFICATION_TOKEN_TTL_MS)
                .copied()
                .unwrap_or(86_400_000),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
        })
    }
}
