use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use super::password::{hash_password, verify_password, HashError};

pub const MIN_PASSWORD_LEN: usize = 6;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A single rule a user record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("missing email")]
    MissingEmail,
    #[error("invalid email")]
    InvalidEmail,
    #[error("missing password")]
    MissingPassword,
    #[error("password too short (minimum 6 characters)")]
    PasswordTooShort,
}

/// Every rule a user record failed, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn contains(&self, field: FieldError) -> bool {
        self.errors.contains(&field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// User record. `password` is plaintext input only and is never stored or serialized.
#[derive(Clone, Default, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    #[sqlx(skip)]
    pub password: String,
    #[serde(skip_serializing)]
    pub encrypted_password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i32,
    pub email: String,
}

impl User {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Checks email shape and that a password is either given or already hashed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if self.email.is_empty() {
            errors.push(FieldError::MissingEmail);
        } else if !is_valid_email(&self.email) {
            errors.push(FieldError::InvalidEmail);
        }

        if self.password.is_empty() {
            if self.encrypted_password.is_empty() {
                errors.push(FieldError::MissingPassword);
            }
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(FieldError::PasswordTooShort);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }

    /// Replaces a plaintext password with its hash. No-op when no plaintext is set.
    pub fn before_create(&mut self) -> Result<(), HashError> {
        if !self.password.is_empty() {
            self.encrypted_password = hash_password(&self.password)?;
            self.password.clear();
        }
        Ok(())
    }

    pub fn compare_password(&self, candidate: &str) -> bool {
        !self.encrypted_password.is_empty() && verify_password(candidate, &self.encrypted_password)
    }

    pub fn sanitize(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) fn test_user() -> User {
    User::new("user@example.org", "password")
}
