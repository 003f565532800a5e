use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{CreateTokenRequest, TokenResponse},
        middleware::AuthUser,
        password,
        tokens::SCOPE_AUTHENTICATION,
    },
    error::{AppError, Result},
    extract::JsonBody,
    state::AppState,
};

pub fn token_routes() -> Router<AppState> {
    Router::new()
        .route("/tokens", post(create_token).delete(revoke_tokens))
        .route("/tokens/", post(create_token).delete(revoke_tokens))
}

/// Exchanges username and password for an authentication token.
#[instrument(skip(state, payload))]
pub async fn create_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateTokenRequest>,
) -> Result<Json<TokenResponse>> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("username and password are required"));
    }

    let user = match state.users.find_by_username(username).await? {
        Some(u) => u,
        None => {
            password::spawn_verify_dummy(payload.password).await?;
            warn!(%username, "login unknown username");
            return Err(AppError::InvalidCredentials);
        }
    };

    let matches = password::spawn_verify(payload.password, user.password_hash.clone()).await?;
    if !matches {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue(user.id, state.config.tokens.ttl(), SCOPE_AUTHENTICATION)
        .await?;

    info!(user_id = user.id, expiry = %token.expiry, "token issued");
    Ok(Json(TokenResponse { token }))
}

/// Logs the caller out everywhere by revoking all of their authentication tokens.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn revoke_tokens(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode> {
    let revoked = state.tokens.revoke_all(user.id, SCOPE_AUTHENTICATION).await?;
    info!(revoked, "tokens revoked");
    Ok(StatusCode::NO_CONTENT)
}
