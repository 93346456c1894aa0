//! PostgreSQL identity store.
//!
//! Staged changes are replayed inside a single transaction on commit. The
//! `users_email_key` and `users_username_key` constraints are the backstop
//! for two registrations that both passed the availability check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::identity::{
    IdentityFilter, IdentityStore, IdentityUnitOfWork, StagedChange, StoreError, UniqueField,
};
use crate::models::user::{RefreshTokenState, User};
use crate::types::UserId;

const USER_COLUMNS: &str = "id, name, surname, email, username, password_hash, \
     refresh_token_hash, refresh_token_expires_at, created_at, updated_at";

const EMAIL_CONSTRAINT: &str = "users_email_key";
const USERNAME_CONSTRAINT: &str = "users_username_key";

#[derive(Debug, FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    surname: Option<String>,
    email: String,
    username: String,
    password_hash: String,
    refresh_token_hash: Option<String>,
    refresh_token_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let refresh_token = match (row.refresh_token_hash, row.refresh_token_expires_at) {
            (Some(fingerprint), Some(expires_at)) => Some(RefreshTokenState {
                fingerprint,
                expires_at,
            }),
            (None, None) => None,
            _ => {
                // The check constraint should make this unreachable.
                tracing::warn!(user_id = %row.id, "Ignoring half-populated refresh token columns");
                None
            }
        };

        User {
            id: row.id,
            name: row.name,
            surname: row.surname,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            refresh_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn begin(&self) -> Result<Box<dyn IdentityUnitOfWork>, StoreError> {
        Ok(Box::new(PgUnitOfWork {
            pool: self.pool.clone(),
            staged: Vec::new(),
        }))
    }
}

struct PgUnitOfWork {
    pool: PgPool,
    staged: Vec<StagedChange>,
}

#[async_trait]
impl IdentityUnitOfWork for PgUnitOfWork {
    async fn find_one(&mut self, filter: &IdentityFilter) -> Result<Option<User>, StoreError> {
        let row = match filter {
            IdentityFilter::Id(id) => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(*id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            IdentityFilter::Email(email) => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .await?
            }
            IdentityFilter::Username(username) => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(username)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        Ok(row.map(User::from))
    }

    fn stage(&mut self, change: StagedChange) {
        self.staged.push(change);
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgUnitOfWork { pool, staged } = *self;
        if staged.is_empty() {
            return Ok(());
        }

        let mut tx = pool.begin().await?;
        for change in staged {
            // Returning early drops `tx`, which rolls the transaction back.
            apply(&mut tx, change).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

async fn apply(tx: &mut Transaction<'_, Postgres>, change: StagedChange) -> Result<(), StoreError> {
    match change {
        StagedChange::Create(user) => {
            let (fingerprint, expires_at) = refresh_columns(&user);
            sqlx::query(
                "INSERT INTO users (id, name, surname, email, username, password_hash, \
                 refresh_token_hash, refresh_token_expires_at, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.surname)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(fingerprint)
            .bind(expires_at)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(map_write_error)?;
        }
        StagedChange::Update {
            user,
            expected_fingerprint,
        } => {
            let (fingerprint, expires_at) = refresh_columns(&user);
            let guarded = expected_fingerprint.is_some();
            let result = sqlx::query(
                "UPDATE users SET refresh_token_hash = $1, refresh_token_expires_at = $2, \
                 updated_at = $3 \
                 WHERE id = $4 AND ($5::TEXT IS NULL OR refresh_token_hash = $5)",
            )
            .bind(fingerprint)
            .bind(expires_at)
            .bind(user.updated_at)
            .bind(user.id)
            .bind(expected_fingerprint)
            .execute(&mut **tx)
            .await
            .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(if guarded {
                    StoreError::Stale
                } else {
                    StoreError::Missing(user.id)
                });
            }
        }
    }
    Ok(())
}

fn refresh_columns(user: &User) -> (Option<&str>, Option<DateTime<Utc>>) {
    match &user.refresh_token {
        Some(state) => (Some(state.fingerprint.as_str()), Some(state.expires_at)),
        None => (None, None),
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(EMAIL_CONSTRAINT) => return StoreError::Conflict(UniqueField::Email),
                Some(USERNAME_CONSTRAINT) => return StoreError::Conflict(UniqueField::Username),
                _ => {}
            }
        }
    }
    StoreError::from(err)
}
