//! The auth orchestrator: ties hashing, tokens, the account store and the
//! notifier into the credential-lifecycle state machine.
//!
//! Failure paths leave no trace: an operation that returns an error has not
//! mutated the store. The only deliberate exception is email delivery, which
//! happens after the state transition commits and is logged on failure rather
//! than rolled back.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::config::AuthConfig;
use super::error::AuthError;
use super::notifier::Notifier;
use super::password::CredentialHasher;
use super::session::{self, SessionClaims};
use super::store::{Account, AccountStore, AccountUpdate, NewAccount, PublicAccount, TokenRecord};
use super::token::{generate_opaque_token, hash_token};

/// Registration fields, already normalized (lowercase username/email) and
/// syntax-validated by the boundary layer.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub password: String,
}

/// Fields for passwordless account provisioning, normalized and validated by
/// the boundary layer like [`RegisterInput`].
#[derive(Debug, Clone)]
pub struct ProvisionInput {
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
}

/// Successful login: the public account plus a signed session token.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub account: PublicAccount,
    pub token: String,
}

/// Profile fields a caller may change. Outer `None` leaves a field as is;
/// `Some(None)` on `display_name` clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub display_name: Option<Option<String>>,
    pub email: Option<String>,
}

pub struct AuthService {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    hasher: CredentialHasher,
    config: AuthConfig,
}

impl AuthService {
    /// # Errors
    ///
    /// Returns an error if the configured password hash cost is out of range.
    pub fn new(
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        let hasher = CredentialHasher::new(config.password_hash_cost())?;
        Ok(Self {
            store,
            notifier,
            hasher,
            config,
        })
    }

    /// Create an account and dispatch its verification email.
    ///
    /// The account starts unverified with a fresh verification token; only
    /// the token's digest is stored.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when the username or email is taken.
    pub async fn register(&self, input: RegisterInput) -> Result<PublicAccount, AuthError> {
        let password_hash = self.hasher.hash(&input.password)?;
        let raw_token = generate_opaque_token()?;
        let expires_at = Utc::now() + Duration::milliseconds(self.config.verification_token_ttl_ms());

        let account = self
            .store
            .create_account(NewAccount {
                username: input.username,
                display_name: input.display_name,
                email: input.email,
                password_hash: Some(password_hash),
                verification_token: Some(TokenRecord {
                    hash: hash_token(&raw_token),
                    expires_at,
                }),
            })
            .await?;

        info!(account_id = %account.id, "account registered");
        self.dispatch_verification(&account.email, &raw_token).await;

        Ok(account.to_public())
    }

    /// Provision an account with no credentials on behalf of `caller_id`.
    ///
    /// Only a caller whose own email is verified may provision accounts. The
    /// new account starts unverified and without a password; its owner takes
    /// over through the resend-verification and forgot-password flows. Until
    /// then, login fails with "Password not set".
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when the caller is gone or not
    /// verified, and [`AuthError::Conflict`] when the username or email is
    /// taken.
    pub async fn create_account(
        &self,
        caller_id: Uuid,
        input: ProvisionInput,
    ) -> Result<PublicAccount, AuthError> {
        let verified = self
            .store
            .find_by_id(caller_id)
            .await?
            .is_some_and(|caller| caller.email_verified);
        if !verified {
            warn!(account_id = %caller_id, "account provisioning denied, email not verified");
            return Err(AuthError::Forbidden(
                "Please verify your email address first",
            ));
        }

        let account = self
            .store
            .create_account(NewAccount {
                username: input.username,
                display_name: input.display_name,
                email: input.email,
                password_hash: None,
                verification_token: None,
            })
            .await?;

        info!(account_id = %account.id, created_by = %caller_id, "account provisioned");
        Ok(account.to_public())
    }

    /// Verify credentials and issue a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] when the account is missing, has
    /// no password set, or the password does not match.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::Unauthorized("User not found"))?;

        let stored = account
            .password_hash
            .as_deref()
            .ok_or(AuthError::Unauthorized("Password not set"))?;
        if !self.hasher.verify(password, stored)? {
            return Err(AuthError::Unauthorized("Invalid credentials"));
        }

        let token = self.issue_session(&account)?;
        info!(account_id = %account.id, "login");
        Ok(LoginOutcome {
            account: account.to_public(),
            token,
        })
    }

    /// Record a logout. Session tokens are stateless, so there is nothing to
    /// revoke; the token stays valid until its expiry.
    pub fn logout(&self, claims: &SessionClaims) {
        info!(account_id = %claims.sub, "logout");
    }

    /// Start a password reset for `email`.
    ///
    /// Deliberately indistinguishable from the outside whether the account
    /// exists: unknown addresses are a silent no-op, and the handler returns
    /// the same response either way.
    ///
    /// # Errors
    ///
    /// Only on store or token-generation failure, never on a missing account.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let Some(account) = self.store.find_by_email(email).await? else {
            return Ok(());
        };

        let raw_token = generate_opaque_token()?;
        let expires_at = Utc::now() + Duration::milliseconds(self.config.reset_token_ttl_ms());
        self.store
            .update_account(
                account.id,
                AccountUpdate {
                    reset_token: Some(Some(TokenRecord {
                        hash: hash_token(&raw_token),
                        expires_at,
                    })),
                    ..AccountUpdate::default()
                },
            )
            .await?;

        if let Err(err) = self
            .notifier
            .send_reset_password_email(&account.email, &raw_token)
            .await
        {
            warn!(account_id = %account.id, error = %err, "failed to send reset email");
        }

        Ok(())
    }

    /// Redeem a reset token and set a new password.
    ///
    /// The password replacement and the token clear happen in one store
    /// write, so a redeemed token can never be replayed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BadRequest`] for an unknown or expired token.
    pub async fn reset_password(
        &self,
        raw_token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let account = self
            .store
            .find_by_reset_token_hash(&hash_token(raw_token), Utc::now())
            .await?
            .ok_or(AuthError::BadRequest("Invalid or expired reset token"))?;

        let password_hash = self.hasher.hash(new_password)?;
        self.store
            .update_account(
                account.id,
                AccountUpdate {
                    password_hash: Some(Some(password_hash)),
                    reset_token: Some(None),
                    ..AccountUpdate::default()
                },
            )
            .await?;

        info!(account_id = %account.id, "password reset");
        Ok(())
    }

    /// Redeem a verification token and mark the email verified.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BadRequest`] for an unknown or expired token.
    pub async fn verify_email(&self, raw_token: &str) -> Result<(), AuthError> {
        let account = self
            .store
            .find_by_verification_token_hash(&hash_token(raw_token), Utc::now())
            .await?
            .ok_or(AuthError::BadRequest("Invalid or expired verification token"))?;

        self.store
            .update_account(
                account.id,
                AccountUpdate {
                    email_verified: Some(true),
                    verification_token: Some(None),
                    ..AccountUpdate::default()
                },
            )
            .await?;

        info!(account_id = %account.id, "email verified");
        Ok(())
    }

    /// Re-send the verification email with a fresh token.
    ///
    /// Same anti-enumeration shape as [`AuthService::forgot_password`]: an
    /// unknown address or an already-verified account is a silent no-op.
    ///
    /// # Errors
    ///
    /// Only on store or token-generation failure.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let Some(account) = self.store.find_by_email(email).await? else {
            return Ok(());
        };
        if account.email_verified {
            return Ok(());
        }

        let raw_token = generate_opaque_token()?;
        let expires_at = Utc::now() + Duration::milliseconds(self.config.verification_token_ttl_ms());
        self.store
            .update_account(
                account.id,
                AccountUpdate {
                    verification_token: Some(Some(TokenRecord {
                        hash: hash_token(&raw_token),
                        expires_at,
                    })),
                    ..AccountUpdate::default()
                },
            )
            .await?;

        self.dispatch_verification(&account.email, &raw_token).await;
        Ok(())
    }

    /// Change the password of an authenticated account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for a missing account,
    /// [`AuthError::Forbidden`] when the current password does not match, and
    /// [`AuthError::BadRequest`] when the new password equals the current one.
    pub async fn update_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let account = self
            .store
            .find_by_id_with_secrets(account_id)
            .await?
            .ok_or(AuthError::NotFound("User not found"))?;

        let stored = account
            .password_hash
            .as_deref()
            .ok_or(AuthError::BadRequest("Password not set"))?;
        if !self.hasher.verify(current_password, stored)? {
            return Err(AuthError::Forbidden("Invalid credentials"));
        }
        if self.hasher.verify(new_password, stored)? {
            return Err(AuthError::BadRequest(
                "New password must be different from current password",
            ));
        }

        let password_hash = self.hasher.hash(new_password)?;
        self.store
            .update_account(
                account_id,
                AccountUpdate {
                    password_hash: Some(Some(password_hash)),
                    ..AccountUpdate::default()
                },
            )
            .await?;

        info!(account_id = %account_id, "password changed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for a missing account.
    pub async fn get_account(&self, account_id: Uuid) -> Result<PublicAccount, AuthError> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound("User not found"))?;
        Ok(account.to_public())
    }

    pub async fn list_accounts(&self) -> Result<Vec<PublicAccount>, AuthError> {
        let accounts = self.store.list_accounts().await?;
        Ok(accounts.iter().map(Account::to_public).collect())
    }

    /// Update profile fields (username, display name, email).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for a missing account and
    /// [`AuthError::Conflict`] when the new username or email is taken.
    pub async fn update_profile(
        &self,
        account_id: Uuid,
        changes: ProfileChanges,
    ) -> Result<PublicAccount, AuthError> {
        let account = self
            .store
            .update_account(
                account_id,
                AccountUpdate {
                    username: changes.username,
                    display_name: changes.display_name,
                    email: changes.email,
                    ..AccountUpdate::default()
                },
            )
            .await?
            .ok_or(AuthError::NotFound("User not found"))?;
        Ok(account.to_public())
    }

    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for a missing account.
    pub async fn delete_account(&self, account_id: Uuid) -> Result<(), AuthError> {
        if !self.store.delete_account(account_id).await? {
            return Err(AuthError::NotFound("User not found"));
        }
        info!(account_id = %account_id, "account deleted");
        Ok(())
    }

    /// Verify a bearer session token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for any malformed, forged or
    /// expired token.
    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        session::verify_hs256(
            token,
            self.config.session_secret_bytes(),
            Utc::now().timestamp(),
        )
        .map_err(|_| AuthError::Unauthorized("Invalid or expired session token"))
    }

    fn issue_session(&self, account: &Account) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: account.id,
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            email: account.email.clone(),
            iat: now,
            exp: now + self.config.session_ttl_seconds(),
        };
        session::sign_hs256(self.config.session_secret_bytes(), &claims)
            .map_err(|err| AuthError::Internal(anyhow!("failed to sign session token: {err}")))
    }

    async fn dispatch_verification(&self, email: &str, raw_token: &str) {
        if let Err(err) = self.notifier.send_verification_email(email, raw_token).await {
            warn!(to_email = %email, error = %err, "failed to send verification email");
        }
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
