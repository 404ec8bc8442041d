use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserFilter};
use crate::db::{StoreError, StoreResult};

/// Credential store. Implementations enforce email uniqueness themselves and
/// report a clash as `StoreError::DuplicateEmail`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; the store assigns the id.
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Users matching `filter`, oldest first.
    async fn list(&self, filter: UserFilter) -> StoreResult<Vec<User>>;

    /// Replace a stored user. `None` when the id no longer exists.
    async fn update(&self, user: User) -> StoreResult<Option<User>>;

    /// `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// In-memory store for tests and `AppState::fake`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = user.into_user(Uuid::new_v4());
        users.insert(user.id, user.clone());
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self, filter: UserFilter) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        let mut out: Vec<User> = users.values().filter(|u| filter.matches(u)).cloned().collect();
        out.sort_by_key(|u| u.created_at);
        Ok(out)
    }

    async fn update(&self, mut user: User) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let Some(slot) = users.get_mut(&user.id) else {
            return Ok(None);
        };
        user.updated_at = OffsetDateTime::now_utc();
        *slot = user.clone();
        Ok(Some(user))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
