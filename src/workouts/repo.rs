use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use super::repo_types::{NewWorkout, NewWorkoutEntry, Workout, WorkoutChanges, WorkoutEntry, WorkoutRow};
use crate::db::StoreError;

/// Persistence for the workout aggregate.
///
/// Writes that touch entries run in one transaction: either the parent and
/// every entry are stored, or nothing is.
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    async fn create(&self, workout: NewWorkout) -> Result<Workout, StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<Workout, StoreError>;
    async fn update(&self, id: i64, changes: WorkoutChanges) -> Result<Workout, StoreError>;
    /// Entries go with the parent through the `ON DELETE CASCADE` foreign key.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgWorkoutStore {
    db: PgPool,
}

impl PgWorkoutStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Insert entries for `workout_id` within a transaction.
async fn insert_entries_tx(
    tx: &mut Transaction<'_, Postgres>,
    workout_id: i64,
    entries: &[NewWorkoutEntry],
) -> anyhow::Result<Vec<WorkoutEntry>> {
    let mut inserted = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let row = sqlx::query_as::<_, WorkoutEntry>(
            r#"
            INSERT INTO workout_entries
                (workout_id, exercise_name, reps, sets, weight, duration_seconds, notes, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, exercise_name, reps, sets, weight, duration_seconds, notes, order_index,
                      created_at, updated_at
            "#,
        )
        .bind(workout_id)
        .bind(&entry.exercise_name)
        .bind(entry.reps)
        .bind(entry.sets)
        .bind(entry.weight)
        .bind(entry.duration_seconds)
        .bind(&entry.notes)
        .bind(entry.order_index)
        .fetch_one(&mut **tx)
        .await
        .with_context(|| format!("insert entry #{position} of workout {workout_id}"))?;
        inserted.push(row);
    }
    Ok(inserted)
}

async fn fetch_entries<'e, E>(executor: E, workout_id: i64) -> Result<Vec<WorkoutEntry>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, WorkoutEntry>(
        r#"
        SELECT id, exercise_name, reps, sets, weight, duration_seconds, notes, order_index,
               created_at, updated_at
          FROM workout_entries
         WHERE workout_id = $1
         ORDER BY order_index ASC, id ASC
        "#,
    )
    .bind(workout_id)
    .fetch_all(executor)
    .await
}

#[async_trait]
impl WorkoutStore for PgWorkoutStore {
    async fn create(&self, workout: NewWorkout) -> Result<Workout, StoreError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let row = sqlx::query_as::<_, WorkoutRow>(
            r#"
            INSERT INTO workouts (title, description, duration_minutes, calories_burned)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, duration_minutes, calories_burned, created_at, updated_at
            "#,
        )
        .bind(&workout.title)
        .bind(&workout.description)
        .bind(workout.duration_minutes)
        .bind(workout.calories_burned)
        .fetch_one(&mut *tx)
        .await?;

        let entries = insert_entries_tx(&mut tx, row.id, &workout.entries).await?;
        tx.commit().await.context("commit tx")?;

        Ok(row.with_entries(entries))
    }

    async fn get_by_id(&self, id: i64) -> Result<Workout, StoreError> {
        let row = sqlx::query_as::<_, WorkoutRow>(
            r#"
            SELECT id, title, description, duration_minutes, calories_burned, created_at, updated_at
              FROM workouts
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;

        let entries = fetch_entries(&self.db, id).await?;
        Ok(row.with_entries(entries))
    }

    async fn update(&self, id: i64, changes: WorkoutChanges) -> Result<Workout, StoreError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let row = sqlx::query_as::<_, WorkoutRow>(
            r#"
            UPDATE workouts
               SET title = $1, description = $2, duration_minutes = $3, calories_burned = $4,
                   updated_at = NOW()
             WHERE id = $5
            RETURNING id, title, description, duration_minutes, calories_burned, created_at, updated_at
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.duration_minutes)
        .bind(changes.calories_burned)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        let entries = match &changes.entries {
            Some(replacement) => {
                sqlx::query("DELETE FROM workout_entries WHERE workout_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                insert_entries_tx(&mut tx, id, replacement).await?
            }
            None => fetch_entries(&mut *tx, id).await?,
        };

        tx.commit().await.context("commit tx")?;
        Ok(row.with_entries(entries))
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM workouts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
