//! Outbound email delivery abstraction.
//!
//! The orchestrator awaits the notifier so it can log delivery failures, but
//! a failure never rolls back committed account or token state. The default
//! for local dev is [`LogNotifier`], which logs the link instead of sending
//! real email.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Delivers reset/verification links to an account's email address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification_email(&self, email: &str, raw_token: &str) -> Result<()>;

    async fn send_reset_password_email(&self, email: &str, raw_token: &str) -> Result<()>;
}

/// Build the frontend verification link included in outbound emails.
#[must_use]
pub fn build_verify_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/verify-email?token={token}")
}

/// Build the frontend password-reset link included in outbound emails.
#[must_use]
pub fn build_reset_url(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/reset-password?token={token}")
}

/// Local dev notifier that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogNotifier {
    frontend_base_url: String,
}

impl LogNotifier {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self { frontend_base_url }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification_email(&self, email: &str, raw_token: &str) -> Result<()> {
        let verify_url = build_verify_url(&self.frontend_base_url, raw_token);
        info!(
            to_email = %email,
            template = "verify_email",
            url = %verify_url,
            "email send stub"
        );
        Ok(())
    }

    async fn send_reset_password_email(&self, email: &str, raw_token: &str) -> Result<()> {
        let reset_url = build_reset_url(&self.frontend_base_url, raw_token);
        info!(
            to_email = %email,
            template = "reset_password",
            url = %reset_url,
            "email send stub"
        );
        Ok(())
    }
}
