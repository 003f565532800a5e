use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Row of the `workouts` table, without its entries.
#[derive(Debug, Clone, FromRow)]
pub struct WorkoutRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl WorkoutRow {
    pub fn with_entries(self, mut entries: Vec<WorkoutEntry>) -> Workout {
        sort_entries(&mut entries);
        Workout {
            id: self.id,
            title: self.title,
            description: self.description,
            duration_minutes: self.duration_minutes,
            calories_burned: self.calories_burned,
            entries,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Entry order is `order_index` ascending, ties broken by insertion (`id`).
pub fn sort_entries(entries: &mut [WorkoutEntry]) {
    entries.sort_by_key(|e| (e.order_index, e.id));
}

/// A workout together with its entries, ordered by `order_index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workout {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    pub entries: Vec<WorkoutEntry>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct WorkoutEntry {
    pub id: i64,
    pub exercise_name: String,
    pub reps: Option<i32>,
    pub sets: i32,
    pub weight: Option<f64>,
    pub duration_seconds: Option<i32>,
    pub notes: String,
    pub order_index: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Entry as supplied by a client; `order_index` is kept exactly as given.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewWorkoutEntry {
    pub exercise_name: String,
    pub reps: Option<i32>,
    pub sets: i32,
    pub weight: Option<f64>,
    pub duration_seconds: Option<i32>,
    #[serde(default)]
    pub notes: String,
    pub order_index: i32,
}

#[derive(Debug, Clone)]
pub struct NewWorkout {
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    pub entries: Vec<NewWorkoutEntry>,
}

/// Full scalar state for an update. `entries: None` keeps the stored entries,
/// `Some(list)` replaces all of them (an empty list clears them).
#[derive(Debug, Clone)]
pub struct WorkoutChanges {
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    pub entries: Option<Vec<NewWorkoutEntry>>,
}
