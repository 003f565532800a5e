use serde::{Deserialize, Serialize};

use super::repo_types::{NewWorkout, NewWorkoutEntry, Workout, WorkoutChanges};
use crate::error::AppError;

/// Request body for `POST /workouts/`.
#[derive(Debug, Deserialize)]
pub struct CreateWorkoutRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    #[serde(default)]
    pub entries: Vec<NewWorkoutEntry>,
}

/// Request body for `PUT /workouts/{id}/`.
///
/// Scalar fields are merged onto the stored workout. `entries` missing (or
/// `null`) leaves the stored entries alone; a list, even an empty one,
/// replaces them wholesale.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateWorkoutRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub calories_burned: Option<i32>,
    pub entries: Option<Vec<NewWorkoutEntry>>,
}

#[derive(Debug, Serialize)]
pub struct WorkoutResponse {
    pub workout: Workout,
}

fn validate_scalars(title: &str, duration_minutes: i32, calories_burned: i32) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }
    if duration_minutes < 0 {
        return Err(AppError::validation("duration_minutes must not be negative"));
    }
    if calories_burned < 0 {
        return Err(AppError::validation("calories_burned must not be negative"));
    }
    Ok(())
}

fn validate_entries(entries: &[NewWorkoutEntry]) -> Result<(), AppError> {
    for (i, entry) in entries.iter().enumerate() {
        if entry.exercise_name.trim().is_empty() {
            return Err(AppError::validation(format!("entries[{i}]: exercise_name is required")));
        }
        if entry.sets < 1 {
            return Err(AppError::validation(format!("entries[{i}]: sets must be at least 1")));
        }
        if entry.reps.is_some_and(|r| r < 0) {
            return Err(AppError::validation(format!("entries[{i}]: reps must not be negative")));
        }
        if entry.duration_seconds.is_some_and(|d| d < 0) {
            return Err(AppError::validation(format!(
                "entries[{i}]: duration_seconds must not be negative"
            )));
        }
        if entry.weight.is_some_and(|w| !w.is_finite() || w < 0.0) {
            return Err(AppError::validation(format!("entries[{i}]: invalid weight")));
        }
    }
    Ok(())
}

impl CreateWorkoutRequest {
    pub fn into_new_workout(self) -> Result<NewWorkout, AppError> {
        validate_scalars(&self.title, self.duration_minutes, self.calories_burned)?;
        validate_entries(&self.entries)?;
        Ok(NewWorkout {
            title: self.title.trim().to_string(),
            description: self.description,
            duration_minutes: self.duration_minutes,
            calories_burned: self.calories_burned,
            entries: self.entries,
        })
    }
}

impl UpdateWorkoutRequest {
    /// Merges onto `existing` and validates the result.
    pub fn merge(self, existing: &Workout) -> Result<WorkoutChanges, AppError> {
        let changes = WorkoutChanges {
            title: self
                .title
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| existing.title.clone()),
            description: self.description.unwrap_or_else(|| existing.description.clone()),
            duration_minutes: self.duration_minutes.unwrap_or(existing.duration_minutes),
            calories_burned: self.calories_burned.unwrap_or(existing.calories_burned),
            entries: self.entries,
        };
        validate_scalars(&changes.title, changes.duration_minutes, changes.calories_burned)?;
        if let Some(entries) = &changes.entries {
            validate_entries(entries)?;
        }
        Ok(changes)
    }
}
