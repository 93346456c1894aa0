//! In-process identity store.
//!
//! Commits take the write lock, apply the staged changes to a copy of the
//! table and swap it in only if every change succeeded. Email and username
//! uniqueness is checked under that lock, which plays the role of the unique
//! index in PostgreSQL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::identity::{
    IdentityFilter, IdentityStore, IdentityUnitOfWork, StagedChange, StoreError, UniqueField,
};
use crate::models::user::User;
use crate::types::UserId;

type Table = HashMap<UserId, User>;

#[derive(Clone, Default)]
pub struct InMemoryIdentityStore {
    users: Arc<RwLock<Table>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn begin(&self) -> Result<Box<dyn IdentityUnitOfWork>, StoreError> {
        Ok(Box::new(InMemoryUnitOfWork {
            users: Arc::clone(&self.users),
            staged: Vec::new(),
        }))
    }
}

struct InMemoryUnitOfWork {
    users: Arc<RwLock<Table>>,
    staged: Vec<StagedChange>,
}

#[async_trait]
impl IdentityUnitOfWork for InMemoryUnitOfWork {
    async fn find_one(&mut self, filter: &IdentityFilter) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| filter.matches(user)).cloned())
    }

    fn stage(&mut self, change: StagedChange) {
        self.staged.push(change);
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork { users, staged } = *self;
        if staged.is_empty() {
            return Ok(());
        }

        let mut table = users.write().await;
        let mut next = table.clone();
        for change in staged {
            apply(&mut next, change)?;
        }
        *table = next;
        Ok(())
    }
}

fn apply(table: &mut Table, change: StagedChange) -> Result<(), StoreError> {
    match change {
        StagedChange::Create(user) => {
            if table.values().any(|u| u.email == user.email) {
                return Err(StoreError::Conflict(UniqueField::Email));
            }
            if table.values().any(|u| u.username == user.username) {
                return Err(StoreError::Conflict(UniqueField::Username));
            }
            table.insert(user.id, user);
        }
        StagedChange::Update {
            user,
            expected_fingerprint,
        } => {
            let stored = table.get_mut(&user.id).ok_or(StoreError::Missing(user.id))?;
            if let Some(expected) = expected_fingerprint {
                if stored.refresh_fingerprint() != Some(expected.as_str()) {
                    return Err(StoreError::Stale);
                }
            }
            stored.refresh_token = user.refresh_token;
            stored.updated_at = user.updated_at;
        }
    }
    Ok(())
}
