//! Cookie-addressed session bag.
//!
//! The request path only depends on [`SessionStore`]; how values travel
//! (signed cookie, server-side table) is up to the implementation.

use async_trait::async_trait;
use axum::http::{header::InvalidHeaderValue, HeaderMap};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

mod cookie;

pub use cookie::CookieStore;

pub const SESSION_NAME: &str = "ebweb";
pub const USER_ID_KEY: &str = "user_id";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session key must be at least {min} bytes")]
    WeakKey { min: usize },
    #[error("session max age must be between 1 and {max} seconds, got {got}")]
    InvalidMaxAge { got: u64, max: u64 },
    #[error("session expiry out of range")]
    ExpiryOverflow,
    #[error("session encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid session cookie: {0}")]
    Header(#[from] InvalidHeaderValue),
    #[error("session backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    values: Map<String, Value>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_values(name, Map::new())
    }

    pub(crate) fn with_values(name: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// `None` when the key is missing or holds a value of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), SessionError> {
        self.values.insert(key.to_owned(), serde_json::to_value(value)?);
        Ok(())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the named session from the request headers, or a fresh empty one.
    async fn get(&self, headers: &HeaderMap, name: &str) -> Result<Session, SessionError>;
    /// Persists `session` and writes whatever the client must carry into `response_headers`.
    async fn save(&self, response_headers: &mut HeaderMap, session: &Session) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_get() {
        let mut s = Session::new(SESSION_NAME);
        assert_eq!(s.get::<i32>(USER_ID_KEY), None);

        s.insert(USER_ID_KEY, 42).unwrap();
        assert_eq!(s.get::<i32>(USER_ID_KEY), Some(42));
        assert_eq!(s.get::<String>(USER_ID_KEY), None);

        s.insert(USER_ID_KEY, "42").unwrap();
        assert_eq!(s.get::<i32>(USER_ID_KEY), None);
    }
}
