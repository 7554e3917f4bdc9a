use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, model::User};

/// The user resolved by `authenticate_user` for this request.
///
/// Only routes behind that middleware can produce it; anywhere else the
/// extractor rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::NotAuthenticated)
    }
}
