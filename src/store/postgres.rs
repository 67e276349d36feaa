//! Postgres-backed account store.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::auth::store::{
    Account, AccountStore, AccountUpdate, NewAccount, StoreError, TokenRecord,
};

const ACCOUNT_COLUMNS: &str = "id, username, display_name, email, password_hash, email_verified, \
     verification_token_hash, verification_expires_at, reset_token_hash, reset_expires_at, \
     created_at, updated_at";

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn token_record(hash: Option<String>, expires_at: Option<DateTime<Utc>>) -> Option<TokenRecord> {
    match (hash, expires_at) {
        (Some(hash), Some(expires_at)) => Some(TokenRecord { hash, expires_at }),
        _ => None,
    }
}

fn row_to_account(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        email_verified: row.get("email_verified"),
        verification_token: token_record(
            row.get("verification_token_hash"),
            row.get("verification_expires_at"),
        ),
        reset_token: token_record(row.get("reset_token_hash"), row.get("reset_expires_at")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// SQLSTATE 23505, mapped to the field behind the violated unique index.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            let field = match db_err.constraint() {
                Some("accounts_username_key") => "Username",
                Some("accounts_email_key") => "Email",
                _ => "Record",
            };
            return StoreError::Conflict {
                field: field.to_string(),
            };
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context("database query failed"))
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create_account(&self, fields: NewAccount) -> Result<Account, StoreError> {
        let query = format!(
            "INSERT INTO accounts \
             (username, display_name, email, password_hash, verification_token_hash, verification_expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ACCOUNT_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %query
        );
        let (token_hash, token_expires_at) = match fields.verification_token {
            Some(token) => (Some(token.hash), Some(token.expires_at)),
            None => (None, None),
        };
        let row = sqlx::query(&query)
            .bind(&fields.username)
            .bind(&fields.display_name)
            .bind(&fields.email)
            .bind(&fields.password_hash)
            .bind(&token_hash)
            .bind(token_expires_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row_to_account(&row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(|row| row_to_account(&row)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(|row| row_to_account(&row)))
    }

    async fn find_by_id_with_secrets(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.find_by_id(id).await
    }

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountUpdate,
    ) -> Result<Option<Account>, StoreError> {
        // Read-modify-write inside one transaction; the row lock keeps a
        // concurrent token redemption from racing the clear.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StoreError::Backend(anyhow::Error::new(err)))?;

        let select = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %select
        );
        let Some(row) = sqlx::query(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };
        let mut account = row_to_account(&row);

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

        let update = format!(
            "UPDATE accounts SET username = $2, display_name = $3, email = $4, \
             password_hash = $5, email_verified = $6, verification_token_hash = $7, \
             verification_expires_at = $8, reset_token_hash = $9, reset_expires_at = $10, \
             updated_at = NOW() WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %update
        );
        let (verification_hash, verification_expires_at) = match &account.verification_token {
            Some(token) => (Some(token.hash.clone()), Some(token.expires_at)),
            None => (None, None),
        };
        let (reset_hash, reset_expires_at) = match &account.reset_token {
            Some(token) => (Some(token.hash.clone()), Some(token.expires_at)),
            None => (None, None),
        };
        let row = sqlx::query(&update)
            .bind(id)
            .bind(&account.username)
            .bind(&account.display_name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.email_verified)
            .bind(&verification_hash)
            .bind(verification_expires_at)
            .bind(&reset_hash)
            .bind(reset_expires_at)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit()
            .await
            .context("failed to commit account update")
            .map_err(StoreError::Backend)?;

        Ok(Some(row_to_account(&row)))
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = "DELETE FROM accounts WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_reset_token_hash(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE reset_token_hash = $1 AND reset_expires_at > $2"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(|row| row_to_account(&row)))
    }

    async fn find_by_verification_token_hash(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE verification_token_hash = $1 AND verification_expires_at > $2"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(|row| row_to_account(&row)))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.iter().map(row_to_account).collect())
    }
}

impl std::fmt::Debug for PgAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgAccountStore").finish_non_exhaustive()
    }
}
