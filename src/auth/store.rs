//! Account record store abstraction.
//!
//! The orchestrator never talks to a concrete database; it goes through
//! [`AccountStore`], injected at construction time. Implementations live in
//! [`crate::store`].

use anyhow::Error as AnyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// A one-time token at rest: digest plus expiry. The raw token never reaches
/// the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Full account record, including credential and token fields.
///
/// Only [`Account::to_public`] ever leaves the service boundary.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub verification_token: Option<TokenRecord>,
    pub reset_token: Option<TokenRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Public projection: never includes the password hash or token fields.
    #[must_use]
    pub fn to_public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// What the service returns to callers about an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PublicAccount {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
}

/// Fields for account creation. Username and email arrive already normalized
/// to lowercase by the boundary layer.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub verification_token: Option<TokenRecord>,
}

/// Partial update applied atomically to one account.
///
/// Outer `None` leaves a field untouched; `Some(None)` on the nullable fields
/// clears them. Token set-and-clear pairs travel as a unit so a successful
/// password reset replaces the hash and drops the reset token in one write.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub display_name: Option<Option<String>>,
    pub email: Option<String>,
    pub password_hash: Option<Option<String>>,
    pub email_verified: Option<bool>,
    pub verification_token: Option<Option<TokenRecord>>,
    pub reset_token: Option<Option<TokenRecord>>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint violation; `field` is the human-readable field name
    /// ("Username", "Email").
    #[error("{field} already exists")]
    Conflict { field: String },
    #[error(transparent)]
    Backend(#[from] AnyError),
}

/// Durable storage of account records and their credential/token fields.
///
/// Lookups return `Ok(None)` rather than an error when no record matches.
/// Token lookups only return records whose expiry is still in the future
/// relative to the supplied `now`; expired tokens are indistinguishable from
/// absent ones.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_account(&self, fields: NewAccount) -> Result<Account, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Same as [`AccountStore::find_by_id`]; named separately because callers
    /// that need the password hash must opt in explicitly.
    async fn find_by_id_with_secrets(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountUpdate,
    ) -> Result<Option<Account>, StoreError>;

    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn find_by_reset_token_hash(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError>;

    async fn find_by_verification_token_hash(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_projection_drops_secrets() {
        let account = Account {
            id: Uuid::nil(),
            username: "alice".to_string(),
            display_name: None,
            email: "alice@example.com".to_string(),
            password_hash: Some("$argon2id$...".to_string()),
            email_verified: false,
            verification_token: Some(TokenRecord {
                hash: "digest".to_string(),
                expires_at: Utc::now(),
            }),
            reset_token: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let public = account.to_public();
        let json = serde_json::to_value(&public).expect("serializable");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("verification_token").is_none());
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn account_update_default_touches_nothing() {
        let update = AccountUpdate::default();
        assert!(update.username.is_none());
        assert!(update.password_hash.is_none());
        assert!(update.reset_token.is_none());
    }
}
