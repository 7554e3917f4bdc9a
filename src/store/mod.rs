//! Persistence contract for users and its backends.
//!
//! Handlers only ever see `Arc<dyn UserRepository>`; the Postgres and
//! in-memory backends return the same error kinds and ordering so they can be
//! swapped without touching request code.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{HashError, User, ValidationError};

mod memstore;
mod sqlstore;

pub use memstore::MemoryUserRepository;
pub use sqlstore::PgUserRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    RecordNotFound,
    #[error("email has already been taken")]
    DuplicateEmail,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Validates, hashes and stores `user`, writing the assigned id back into it.
    async fn create(&self, user: &mut User) -> Result<(), StoreError>;
    async fn find(&self, id: i32) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;
    /// All users ordered by ascending id.
    async fn get_all(&self) -> Result<Vec<User>, StoreError>;
}

/// Runs the entity hooks every backend must apply before persisting.
fn prepare(user: &mut User) -> Result<(), StoreError> {
    user.validate()?;
    user.before_create()?;
    Ok(())
}
