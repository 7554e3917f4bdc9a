use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{error, info, instrument, warn};

use super::{dto::CredentialsRequest, extractors::CurrentUser};
use crate::{
    error::ApiError,
    model::{verify_dummy_password, PublicUser, User},
    session::{SESSION_NAME, USER_ID_KEY},
    state::AppState,
    store::StoreError,
};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// POST /users
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let Json(payload) = payload?;
    let mut user = User::new(normalize_email(&payload.email), payload.password);

    if let Err(e) = state.users.create(&mut user).await {
        match &e {
            StoreError::Database(_) | StoreError::Hash(_) => {
                error!(error = %e, "create user failed")
            }
            _ => warn!(error = %e, email = %user.email, "create user rejected"),
        }
        return Err(ApiError::Unprocessable(e.to_string()));
    }

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.sanitize())))
}

/// POST /sessions
///
/// Unknown email, wrong password and a failed lookup all produce the same response.
#[instrument(skip(state, headers, payload))]
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap), ApiError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);

    let user = match state.users.find_by_email(&email).await {
        Ok(u) => u,
        Err(e) => {
            match &e {
                StoreError::RecordNotFound => warn!(email = %email, "login unknown email"),
                _ => error!(error = %e, "find_by_email failed"),
            }
            // keep the miss as slow as a wrong password
            verify_dummy_password(&payload.password);
            return Err(ApiError::IncorrectCredentials);
        }
    };

    if !user.compare_password(&payload.password) {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::IncorrectCredentials);
    }

    let mut session = state
        .sessions
        .get(&headers, SESSION_NAME)
        .await
        .map_err(|e| {
            error!(error = %e, "session lookup failed");
            ApiError::internal(e)
        })?;
    session.insert(USER_ID_KEY, user.id).map_err(ApiError::internal)?;

    let mut response_headers = HeaderMap::new();
    state
        .sessions
        .save(&mut response_headers, &session)
        .await
        .map_err(|e| {
            error!(error = %e, "session save failed");
            ApiError::internal(e)
        })?;

    info!(user_id = user.id, "user logged in");
    Ok((StatusCode::OK, response_headers))
}

/// GET /private/whoami
#[instrument(skip_all)]
pub async fn whoami(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.sanitize())
}

/// GET /private/users
#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _: CurrentUser,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = state.users.get_all().await.map_err(|e| {
        error!(error = %e, "get_all failed");
        ApiError::internal(e)
    })?;
    Ok(Json(users.iter().map(User::sanitize).collect()))
}
