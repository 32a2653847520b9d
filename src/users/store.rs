use std::collections::HashMap;

use axum::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::repo_types::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("username {0:?} already exists")]
    Duplicate(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence boundary for user records, keyed by username.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Upsert: inserts, or overwrites hash and profile of an existing row.
    /// `created_at` of an existing row is kept.
    async fn save(&self, user: NewUser) -> Result<User, StoreError>;

    /// Create-only. Fails with `Duplicate` when the username is taken.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn materialize(user: NewUser, created_at: OffsetDateTime) -> User {
    User {
        username: user.username,
        password_hash: user.password_hash,
        email: user.email,
        display_name: user.display_name,
        created_at,
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn save(&self, user: NewUser) -> Result<User, StoreError> {
        if user.username.is_empty() {
            return Err(StoreError::EmptyUsername);
        }
        let mut users = self.users.write().await;
        let created_at = users
            .get(&user.username)
            .map(|u| u.created_at)
            .unwrap_or_else(OffsetDateTime::now_utc);
        let stored = materialize(user, created_at);
        users.insert(stored.username.clone(), stored.clone());
        Ok(stored)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        if user.username.is_empty() {
            return Err(StoreError::EmptyUsername);
        }
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StoreError::Duplicate(user.username));
        }
        let stored = materialize(user, OffsetDateTime::now_utc());
        users.insert(stored.username.clone(), stored.clone());
        Ok(stored)
    }
}
