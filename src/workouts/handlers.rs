use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{CreateWorkoutRequest, UpdateWorkoutRequest, WorkoutResponse};
use crate::{
    auth::middleware::AuthUser,
    db::StoreError,
    error::{AppError, Result},
    extract::{Id, JsonBody},
    state::AppState,
};

// --- routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/workouts/:id", get(get_workout))
        .route("/workouts/:id/", get(get_workout))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/workouts", post(create_workout))
        .route("/workouts/", post(create_workout))
        .route("/workouts/:id", put(update_workout).delete(delete_workout))
        .route("/workouts/:id/", put(update_workout).delete(delete_workout))
}

fn not_found(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::NotFound("workout not found".into()),
        other => other.into(),
    }
}

// --- handlers ---

#[instrument(skip(state, user, payload), fields(user_id = user.id))]
pub async fn create_workout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(payload): JsonBody<CreateWorkoutRequest>,
) -> Result<(StatusCode, Json<WorkoutResponse>)> {
    let new_workout = payload.into_new_workout()?;
    let workout = state.workouts.create(new_workout).await?;
    info!(workout_id = workout.id, entries = workout.entries.len(), "workout created");
    Ok((StatusCode::CREATED, Json(WorkoutResponse { workout })))
}

#[instrument(skip(state))]
pub async fn get_workout(State(state): State<AppState>, Id(id): Id) -> Result<Json<WorkoutResponse>> {
    let workout = state.workouts.get_by_id(id).await.map_err(not_found)?;
    Ok(Json(WorkoutResponse { workout }))
}

#[instrument(skip(state, user, payload), fields(user_id = user.id))]
pub async fn update_workout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Id(id): Id,
    JsonBody(payload): JsonBody<UpdateWorkoutRequest>,
) -> Result<Json<WorkoutResponse>> {
    let existing = state.workouts.get_by_id(id).await.map_err(not_found)?;
    let changes = payload.merge(&existing)?;
    let replaced = changes.entries.is_some();
    let workout = state.workouts.update(id, changes).await.map_err(not_found)?;
    info!(workout_id = id, replaced_entries = replaced, "workout updated");
    Ok(Json(WorkoutResponse { workout }))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_workout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Id(id): Id,
) -> Result<StatusCode> {
    state.workouts.delete(id).await.map_err(not_found)?;
    info!(workout_id = id, "workout deleted");
    Ok(StatusCode::NO_CONTENT)
}
