//! State-machine tests for the auth orchestrator, run against the in-memory
//! store and a recording notifier.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::SecretString;

use super::notifier::Notifier;
use super::store::{AccountStore, AccountUpdate, TokenRecord};
use super::{
    hash_token, AuthConfig, AuthError, AuthService, ProfileChanges, ProvisionInput, RegisterInput,
};
use crate::store::MemoryAccountStore;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Verification { email: String, token: String },
    Reset { email: String, token: String },
}

#[derive(Debug, Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("not poisoned").clone()
    }

    fn last_token(&self) -> Option<String> {
        self.sent().last().map(|sent| match sent {
            Sent::Verification { token, .. } | Sent::Reset { token, .. } => token.clone(),
        })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification_email(&self, email: &str, raw_token: &str) -> Result<()> {
        self.sent
            .lock()
            .expect("not poisoned")
            .push(Sent::Verification {
                email: email.to_string(),
                token: raw_token.to_string(),
            });
        Ok(())
    }

    async fn send_reset_password_email(&self, email: &str, raw_token: &str) -> Result<()> {
        self.sent.lock().expect("not poisoned").push(Sent::Reset {
            email: email.to_string(),
            token: raw_token.to_string(),
        });
        Ok(())
    }
}

struct Harness {
    service: AuthService,
    store: Arc<MemoryAccountStore>,
    notifier: Arc<RecordingNotifier>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryAccountStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let config = AuthConfig::new(
        SecretString::from("test-session-secret".to_string()),
        "http://localhost:3000".to_string(),
    )
    .with_password_hash_cost(1);
    let service = AuthService::new(store.clone(), notifier.clone(), config)
        .expect("valid test config");
    Harness {
        service,
        store,
        notifier,
    }
}

fn alice() -> RegisterInput {
    RegisterInput {
        username: "alice".to_string(),
        display_name: Some("Alice".to_string()),
        email: "alice@example.com".to_string(),
        password: "Passw0rd!".to_string(),
    }
}

#[tokio::test]
async fn register_creates_unverified_account_and_sends_token() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;
    assert_eq!(public.username, "alice");

    let stored = h
        .store
        .find_by_email("alice@example.com")
        .await?
        .expect("account exists");
    assert!(!stored.email_verified);
    assert!(stored.password_hash.is_some());
    assert_ne!(stored.password_hash.as_deref(), Some("Passw0rd!"));

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    let Sent::Verification { email, token } = &sent[0] else {
        panic!("expected a verification email");
    };
    assert_eq!(email, "alice@example.com");
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

    // Store holds the digest, never the raw token.
    let record = stored.verification_token.expect("token set");
    assert_eq!(record.hash, hash_token(token));
    assert_ne!(&record.hash, token);
    Ok(())
}

#[tokio::test]
async fn register_duplicate_email_conflicts() -> Result<(), AuthError> {
    let h = harness();
    h.service.register(alice()).await?;

    let result = h
        .service
        .register(RegisterInput {
            username: "alice2".to_string(),
            ..alice()
        })
        .await;
    assert!(matches!(result, Err(AuthError::Conflict(ref msg)) if msg == "Email already exists"));
    Ok(())
}

#[tokio::test]
async fn login_issues_verifiable_session_token() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;

    let outcome = h.service.login("alice@example.com", "Passw0rd!").await?;
    assert_eq!(outcome.account, public);

    let claims = h.service.verify_session(&outcome.token)?;
    assert_eq!(claims.sub, public.id);
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.email, "alice@example.com");
    assert!(claims.exp > claims.iat);
    Ok(())
}

#[tokio::test]
async fn login_failures_use_distinct_messages() -> Result<(), AuthError> {
    let h = harness();
    h.service.register(alice()).await?;

    let result = h.service.login("nobody@example.com", "Passw0rd!").await;
    assert!(matches!(result, Err(AuthError::Unauthorized("User not found"))));

    let result = h.service.login("alice@example.com", "wrong").await;
    assert!(matches!(
        result,
        Err(AuthError::Unauthorized("Invalid credentials"))
    ));

    // A failed login mutates nothing.
    let stored = h
        .store
        .find_by_email("alice@example.com")
        .await?
        .expect("account exists");
    assert!(!stored.email_verified);
    assert!(stored.reset_token.is_none());
    Ok(())
}

#[tokio::test]
async fn login_without_password_set() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;
    h.store
        .update_account(
            public.id,
            AccountUpdate {
                password_hash: Some(None),
                ..AccountUpdate::default()
            },
        )
        .await?;

    let result = h.service.login("alice@example.com", "Passw0rd!").await;
    assert!(matches!(
        result,
        Err(AuthError::Unauthorized("Password not set"))
    ));
    Ok(())
}

#[tokio::test]
async fn verify_session_rejects_garbage() {
    let h = harness();
    let result = h.service.verify_session("not.a.token");
    assert!(matches!(result, Err(AuthError::Unauthorized(_))));
}

#[tokio::test]
async fn forgot_password_sets_hashed_token_for_known_email() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;

    h.service.forgot_password("alice@example.com").await?;

    let raw = h.notifier.last_token().expect("reset email sent");
    let stored = h
        .store
        .find_by_id(public.id)
        .await?
        .expect("account exists");
    let record = stored.reset_token.expect("reset token set");
    assert_eq!(record.hash, hash_token(&raw));
    assert!(record.expires_at > Utc::now());
    Ok(())
}

#[tokio::test]
async fn forgot_password_unknown_email_is_silent_noop() -> Result<(), AuthError> {
    let h = harness();
    h.service.register(alice()).await?;
    let before = h.notifier.sent().len();

    h.service.forgot_password("nobody@example.com").await?;

    assert_eq!(h.notifier.sent().len(), before);
    let stored = h
        .store
        .find_by_email("alice@example.com")
        .await?
        .expect("account exists");
    assert!(stored.reset_token.is_none());
    Ok(())
}

#[tokio::test]
async fn reset_password_is_single_use() -> Result<(), AuthError> {
    let h = harness();
    h.service.register(alice()).await?;
    h.service.forgot_password("alice@example.com").await?;
    let raw = h.notifier.last_token().expect("reset email sent");

    h.service.reset_password(&raw, "NewPassw0rd!").await?;

    // Old password dead, new one works.
    assert!(h.service.login("alice@example.com", "Passw0rd!").await.is_err());
    h.service.login("alice@example.com", "NewPassw0rd!").await?;

    // Redeemed token cannot be replayed.
    let result = h.service.reset_password(&raw, "AnotherPass1!").await;
    assert!(matches!(
        result,
        Err(AuthError::BadRequest("Invalid or expired reset token"))
    ));
    Ok(())
}

#[tokio::test]
async fn reset_password_rejects_expired_token() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;

    let raw = "a".repeat(64);
    h.store
        .update_account(
            public.id,
            AccountUpdate {
                reset_token: Some(Some(TokenRecord {
                    hash: hash_token(&raw),
                    expires_at: Utc::now() - Duration::milliseconds(1),
                })),
                ..AccountUpdate::default()
            },
        )
        .await?;

    let result = h.service.reset_password(&raw, "NewPassw0rd!").await;
    assert!(matches!(
        result,
        Err(AuthError::BadRequest("Invalid or expired reset token"))
    ));
    // The rejected attempt changed nothing; the old password still works.
    h.service.login("alice@example.com", "Passw0rd!").await?;
    Ok(())
}

#[tokio::test]
async fn verify_email_consumes_token() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;
    let raw = h.notifier.last_token().expect("verification email sent");

    h.service.verify_email(&raw).await?;

    let stored = h
        .store
        .find_by_id(public.id)
        .await?
        .expect("account exists");
    assert!(stored.email_verified);
    assert!(stored.verification_token.is_none());

    let result = h.service.verify_email(&raw).await;
    assert!(matches!(
        result,
        Err(AuthError::BadRequest("Invalid or expired verification token"))
    ));
    Ok(())
}

#[tokio::test]
async fn resend_verification_rotates_token_for_unverified_account() -> Result<(), AuthError> {
    let h = harness();
    h.service.register(alice()).await?;
    let first = h.notifier.last_token().expect("initial token");

    h.service.resend_verification("alice@example.com").await?;
    let second = h.notifier.last_token().expect("resent token");
    assert_ne!(first, second);

    // The old token no longer matches the stored digest.
    let result = h.service.verify_email(&first).await;
    assert!(result.is_err());
    h.service.verify_email(&second).await?;
    Ok(())
}

#[tokio::test]
async fn resend_verification_is_uniform_for_unknown_and_verified() -> Result<(), AuthError> {
    let h = harness();
    h.service.register(alice()).await?;
    let raw = h.notifier.last_token().expect("verification email sent");
    h.service.verify_email(&raw).await?;
    let before = h.notifier.sent().len();

    // Both shapes succeed and send nothing.
    h.service.resend_verification("nobody@example.com").await?;
    h.service.resend_verification("alice@example.com").await?;
    assert_eq!(h.notifier.sent().len(), before);
    Ok(())
}

#[tokio::test]
async fn update_password_checks_current_and_rejects_same() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;

    let result = h
        .service
        .update_password(public.id, "wrong", "NewPassw0rd!")
        .await;
    assert!(matches!(
        result,
        Err(AuthError::Forbidden("Invalid credentials"))
    ));

    let result = h
        .service
        .update_password(public.id, "Passw0rd!", "Passw0rd!")
        .await;
    assert!(matches!(
        result,
        Err(AuthError::BadRequest(
            "New password must be different from current password"
        ))
    ));

    h.service
        .update_password(public.id, "Passw0rd!", "NewPassw0rd!")
        .await?;
    h.service.login("alice@example.com", "NewPassw0rd!").await?;
    Ok(())
}

#[tokio::test]
async fn update_profile_clears_display_name_and_detects_conflicts() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;
    h.service
        .register(RegisterInput {
            username: "bob".to_string(),
            display_name: None,
            email: "bob@example.com".to_string(),
            password: "Passw0rd!".to_string(),
        })
        .await?;

    let updated = h
        .service
        .update_profile(
            public.id,
            ProfileChanges {
                display_name: Some(None),
                ..ProfileChanges::default()
            },
        )
        .await?;
    assert!(updated.display_name.is_none());

    let result = h
        .service
        .update_profile(
            public.id,
            ProfileChanges {
                username: Some("bob".to_string()),
                ..ProfileChanges::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AuthError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn delete_account_then_not_found() -> Result<(), AuthError> {
    let h = harness();
    let public = h.service.register(alice()).await?;

    h.service.delete_account(public.id).await?;

    let result = h.service.get_account(public.id).await;
    assert!(matches!(result, Err(AuthError::NotFound("User not found"))));
    let result = h.service.delete_account(public.id).await;
    assert!(matches!(result, Err(AuthError::NotFound("User not found"))));
    Ok(())
}

#[tokio::test]
async fn list_accounts_returns_public_projections() -> Result<(), AuthError> {
    let h = harness();
    h.service.register(alice()).await?;
    h.service
        .register(RegisterInput {
            username: "bob".to_string(),
            display_name: None,
            email: "bob@example.com".to_string(),
            password: "Passw0rd!".to_string(),
        })
        .await?;

    let accounts = h.service.list_accounts().await?;
    assert_eq!(accounts.len(), 2);
    let usernames: Vec<&str> = accounts.iter().map(|a| a.username.as_str()).collect();
    assert!(usernames.contains(&"alice"));
    assert!(usernames.contains(&"bob"));
    Ok(())
}

fn bob_without_password() -> ProvisionInput {
    ProvisionInput {
        username: "bob".to_string(),
        display_name: None,
        email: "bob@example.com".to_string(),
    }
}

#[tokio::test]
async fn provisioned_account_cannot_login_until_password_set() -> Result<(), AuthError> {
    let h = harness();
    let creator = h.service.register(alice()).await?;
    let token = h.notifier.last_token().expect("verification email sent");
    h.service.verify_email(&token).await?;

    let public = h
        .service
        .create_account(creator.id, bob_without_password())
        .await?;
    assert_eq!(public.username, "bob");

    let stored = h
        .store
        .find_by_email("bob@example.com")
        .await?
        .expect("account exists");
    assert!(stored.password_hash.is_none());
    assert!(!stored.email_verified);
    assert!(stored.verification_token.is_none());

    let result = h.service.login("bob@example.com", "Passw0rd!").await;
    assert!(matches!(
        result,
        Err(AuthError::Unauthorized("Password not set"))
    ));
    Ok(())
}

#[tokio::test]
async fn provisioning_requires_a_verified_caller() -> Result<(), AuthError> {
    let h = harness();
    let creator = h.service.register(alice()).await?;

    let result = h
        .service
        .create_account(creator.id, bob_without_password())
        .await;
    assert!(matches!(
        result,
        Err(AuthError::Forbidden("Please verify your email address first"))
    ));
    // Denied provisioning leaves nothing behind.
    assert!(h.store.find_by_email("bob@example.com").await?.is_none());

    // An unknown caller id is refused the same way.
    let result = h
        .service
        .create_account(uuid::Uuid::new_v4(), bob_without_password())
        .await;
    assert!(matches!(result, Err(AuthError::Forbidden(_))));
    Ok(())
}
