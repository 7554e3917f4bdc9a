mod password;
mod user;

pub use password::{verify_dummy_password, HashError};
pub use user::{FieldError, PublicUser, User, ValidationError};
