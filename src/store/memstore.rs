use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{prepare, StoreError, UserRepository};
use crate::model::User;

#[derive(Default)]
struct Users {
    by_id: BTreeMap<i32, User>,
    last_id: i32,
}

/// Process-local backend. Writers hold the lock for the whole
/// check-assign-insert step so concurrent registrations cannot share an id or email.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<Users>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &mut User) -> Result<(), StoreError> {
        // hash outside the lock, argon2 is slow on purpose
        prepare(user)?;

        let mut users = self.users.write().await;
        if users.by_id.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        users.last_id += 1;
        user.id = users.last_id;
        users.by_id.insert(user.id, user.clone());
        Ok(())
    }

    async fn find(&self, id: i32) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or(StoreError::RecordNotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .by_id
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::RecordNotFound)
    }

    async fn get_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.by_id.values().cloned().collect())
    }
}
