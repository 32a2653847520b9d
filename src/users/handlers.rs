use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use crate::{
    auth::extractors::AuthUser,
    state::AppState,
    users::dto::{PublicUser, RegisterRequest},
};

pub const WELCOME_MESSAGE: &str = "Welcome to the doorman authentication service";

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/welcome", get(welcome))
        .route("/register", post(register))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub async fn welcome() -> &'static str {
    WELCOME_MESSAGE
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state
        .registration
        .register(payload)
        .await
        .map_err(|e| e.rejection())?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state
        .users
        .find_by_username(&username)
        .await
        .map_err(|e| {
            error!(error = %e, %username, "find_by_username failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        })?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    Ok(Json(user.into()))
}
