use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use super::extractors::CurrentUser;
use crate::{
    error::ApiError,
    session::{SESSION_NAME, USER_ID_KEY},
    state::AppState,
    store::StoreError,
};

/// Resolves the session's `user_id` to a user and hands it downstream as
/// [`CurrentUser`]. Any failure ends the request here.
pub async fn authenticate_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = state
        .sessions
        .get(request.headers(), SESSION_NAME)
        .await
        .map_err(|e| {
            error!(error = %e, "session lookup failed");
            ApiError::internal(e)
        })?;

    let Some(user_id) = session.get::<i32>(USER_ID_KEY) else {
        debug!("no user_id in session");
        return Err(ApiError::NotAuthenticated);
    };

    let user = match state.users.find(user_id).await {
        Ok(u) => u,
        Err(StoreError::RecordNotFound) => {
            warn!(user_id, "session refers to unknown user");
            return Err(ApiError::NotAuthenticated);
        }
        Err(e) => {
            error!(error = %e, user_id, "user lookup failed");
            return Err(ApiError::NotAuthenticated);
        }
    };

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}
