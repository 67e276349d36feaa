//! In-memory account store for tests and local experiments.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::store::{
    Account, AccountStore, AccountUpdate, NewAccount, StoreError, TokenRecord,
};

/// Hash-map backed store with the same uniqueness and expiry semantics as the
/// Postgres backend.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Account>> {
        match self.accounts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn conflict_for(
        accounts: &HashMap<Uuid, Account>,
        skip: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Option<StoreError> {
        for account in accounts.values() {
            if Some(account.id) == skip {
                continue;
            }
            if username.is_some_and(|candidate| account.username == candidate) {
                return Some(StoreError::Conflict {
                    field: "Username".to_string(),
                });
            }
            if email.is_some_and(|candidate| account.email == candidate) {
                return Some(StoreError::Conflict {
                    field: "Email".to_string(),
                });
            }
        }
        None
    }

    fn live_token<'a>(
        token: Option<&'a TokenRecord>,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a TokenRecord> {
        token.filter(|record| record.hash == hash && record.expires_at > now)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create_account(&self, fields: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.lock();
        if let Some(conflict) = Self::conflict_for(
            &accounts,
            None,
            Some(&fields.username),
            Some(&fields.email),
        ) {
            return Err(conflict);
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            username: fields.username,
            display_name: fields.display_name,
            email: fields.email,
            password_hash: fields.password_hash,
            email_verified: false,
            verification_token: fields.verification_token,
            reset_token: None,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.lock();
        Ok(accounts
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn find_by_id_with_secrets(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.find_by_id(id).await
    }

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountUpdate,
    ) -> Result<Option<Account>, StoreError> {
        let mut accounts = self.lock();
        if let Some(conflict) = Self::conflict_for(
            &accounts,
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
        ) {
            return Err(conflict);
        }

        let Some(account) = accounts.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(username) = changes.username {
            account.username = username;
        }
        if let Some(display_name) = changes.display_name {
            account.display_name = display_name;
        }
        if let Some(email) = changes.email {
            account.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            account.password_hash = password_hash;
        }
        if let Some(email_verified) = changes.email_verified {
            account.email_verified = email_verified;
        }
        if let Some(verification_token) = changes.verification_token {
            account.verification_token = verification_token;
        }
        if let Some(reset_token) = changes.reset_token {
            account.reset_token = reset_token;
        }
        account.updated_at = Utc::now();

        Ok(Some(account.clone()))
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock().remove(&id).is_some())
    }

    async fn find_by_reset_token_hash(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError> {
        let accounts = self.lock();
        Ok(accounts
            .values()
            .find(|account| Self::live_token(account.reset_token.as_ref(), hash, now).is_some())
            .cloned())
    }

    async fn find_by_verification_token_hash(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError> {
        let accounts = self.lock();
        Ok(accounts
            .values()
            .find(|account| {
                Self::live_token(account.verification_token.as_ref(), hash, now).is_some()
            })
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = self.lock();
        let mut all: Vec<Account> = accounts.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            display_name: None,
            email: email.to_string(),
            password_hash: Some("$argon2id$stub".to_string()),
            verification_token: None,
        }
    }

    #[tokio::test]
    async fn create_enforces_unique_username_and_email() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        store.create_account(new_account("alice", "alice@example.com")).await?;

        let err = store
            .create_account(new_account("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref field } if field == "Username"));

        let err = store
            .create_account(new_account("bob", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref field } if field == "Email"));
        Ok(())
    }

    #[tokio::test]
    async fn expired_tokens_are_invisible() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let account = store
            .create_account(new_account("alice", "alice@example.com"))
            .await?;

        let now = Utc::now();
        store
            .update_account(
                account.id,
                AccountUpdate {
                    reset_token: Some(Some(TokenRecord {
                        hash: "digest".to_string(),
                        expires_at: now + Duration::minutes(5),
                    })),
                    ..AccountUpdate::default()
                },
            )
            .await?;

        assert!(store.find_by_reset_token_hash("digest", now).await?.is_some());
        assert!(store
            .find_by_reset_token_hash("digest", now + Duration::minutes(6))
            .await?
            .is_none());
        assert!(store.find_by_reset_token_hash("other", now).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn update_clears_nullable_fields() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let account = store
            .create_account(NewAccount {
                display_name: Some("Alice".to_string()),
                ..new_account("alice", "alice@example.com")
            })
            .await?;

        let updated = store
            .update_account(
                account.id,
                AccountUpdate {
                    display_name: Some(None),
                    password_hash: Some(None),
                    ..AccountUpdate::default()
                },
            )
            .await?
            .expect("account exists");
        assert!(updated.display_name.is_none());
        assert!(updated.password_hash.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn update_missing_account_returns_none() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let updated = store
            .update_account(Uuid::new_v4(), AccountUpdate::default())
            .await?;
        assert!(updated.is_none());
        assert!(!store.delete_account(Uuid::new_v4()).await?);
        Ok(())
    }
}
