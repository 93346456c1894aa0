//! Identity store boundary.
//!
//! A store hands out units of work. Reads go straight to storage; writes are
//! staged and only become visible when [`IdentityUnitOfWork::commit`]
//! applies all of them in one transaction.

use async_trait::async_trait;

use crate::models::user::User;
use crate::types::UserId;

/// Lookup key for [`IdentityUnitOfWork::find_one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityFilter {
    Id(UserId),
    Email(String),
    Username(String),
}

impl IdentityFilter {
    pub fn matches(&self, user: &User) -> bool {
        match self {
            IdentityFilter::Id(id) => user.id == *id,
            IdentityFilter::Email(email) => user.email == *email,
            IdentityFilter::Username(username) => user.username == *username,
        }
    }
}

/// Identity fields backed by a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

#[derive(Debug, Clone)]
pub enum StagedChange {
    Create(User),
    /// Writes the refresh-token fields. With `expected_fingerprint` set, the
    /// write only applies while the stored fingerprint still has that value.
    Update {
        user: User,
        expected_fingerprint: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0:?}")]
    Conflict(UniqueField),

    #[error("identity was modified by a concurrent commit")]
    Stale,

    #[error("identity {0} does not exist")]
    Missing(UserId),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.into())
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn IdentityUnitOfWork>, StoreError>;
}

#[async_trait]
pub trait IdentityUnitOfWork: Send {
    /// Returns at most one identity matching `filter`.
    async fn find_one(&mut self, filter: &IdentityFilter) -> Result<Option<User>, StoreError>;

    fn stage(&mut self, change: StagedChange);

    /// Applies every staged change atomically. Nothing is written if any
    /// change is rejected.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    fn create(&mut self, user: User) {
        self.stage(StagedChange::Create(user));
    }

    fn update(&mut self, user: User) {
        self.stage(StagedChange::Update {
            user,
            expected_fingerprint: None,
        });
    }

    fn update_guarded(&mut self, user: User, expected_fingerprint: String) {
        self.stage(StagedChange::Update {
            user,
            expected_fingerprint: Some(expected_fingerprint),
        });
    }
}
