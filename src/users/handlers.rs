use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{RegisterRequest, UpdateUserRequest, UserResponse},
    repo_types::NewUser,
};
use crate::{
    auth::{middleware::AuthUser, password, tokens::SCOPE_AUTHENTICATION},
    db::StoreError,
    error::{AppError, Result},
    extract::{Id, JsonBody},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/", post(register))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/users/:id/", get(get_user).put(update_user).delete(delete_user))
}

fn conflict(err: StoreError) -> AppError {
    match err {
        StoreError::Conflict(constraint) if constraint.contains("username") => {
            AppError::Conflict("username is already taken".into())
        }
        StoreError::Conflict(constraint) if constraint.contains("email") => {
            AppError::Conflict("email is already registered".into())
        }
        other => other.into(),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    if let Err(e) = payload.normalize() {
        warn!(error = %e, "invalid registration");
        return Err(e);
    }

    let password_hash = password::spawn_hash(payload.password).await?;
    let user = state
        .users
        .create(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            bio: payload.bio,
        })
        .await
        .map_err(conflict)?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse { user: Some(user) })))
}

/// A missing user answers 200 with `{"user": null}`.
#[instrument(skip(state))]
pub async fn get_user(State(state): State<AppState>, Id(id): Id) -> Result<Json<UserResponse>> {
    let user = state.users.find_by_id(id).await?;
    Ok(Json(UserResponse { user }))
}

#[instrument(skip(state, actor, payload), fields(actor_id = actor.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Id(id): Id,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let mut user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    payload.merge_into(&mut user)?;
    if let Some(plain) = payload.password {
        user.password_hash = password::spawn_hash(plain).await?;
        // revoke before the new digest is stored
        let revoked = state.tokens.revoke_all(user.id, SCOPE_AUTHENTICATION).await?;
        info!(user_id = user.id, revoked, "password rotation, tokens revoked");
    }

    let user = state.users.update(&user).await.map_err(|e| match e {
        StoreError::NotFound => AppError::NotFound("user not found".into()),
        other => conflict(other),
    })?;

    info!(user_id = user.id, "user updated");
    Ok(Json(UserResponse { user: Some(user) }))
}

#[instrument(skip(state, actor), fields(actor_id = actor.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Id(id): Id,
) -> Result<StatusCode> {
    match state.users.delete(id).await {
        Ok(()) => {
            info!(user_id = id, "user deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(StoreError::NotFound) => Err(AppError::NotFound("user not found".into())),
        Err(e) => Err(e.into()),
    }
}
