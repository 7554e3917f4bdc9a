use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod middleware;

/// Public registration/login routes plus the `/private` tree gated by
/// [`middleware::authenticate_user`].
pub fn router(state: AppState) -> Router<AppState> {
    let private = Router::new()
        .route("/whoami", get(handlers::whoami))
        .route("/users", get(handlers::list_users))
        .route_layer(from_fn_with_state(state, middleware::authenticate_user));

    Router::new()
        .route("/users", post(handlers::create_user))
        .route("/sessions", post(handlers::create_session))
        .nest("/private", private)
}
