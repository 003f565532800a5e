//! In-memory stores and request helpers for unit tests.
//!
//! [`MemoryStore`] mirrors the Postgres schema closely enough for handler tests:
//! unique usernames and emails, token cascade on user delete, entry CHECKs
//! enforced before anything is written.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;

use crate::{
    app::build_app,
    auth::{
        repo::TokenStore,
        tokens::{Token, TokenIssuer, SCOPE_AUTHENTICATION},
    },
    db::StoreError,
    state::AppState,
    users::{
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    workouts::{
        repo::WorkoutStore,
        repo_types::{NewWorkout, NewWorkoutEntry, Workout, WorkoutChanges, WorkoutEntry, WorkoutRow},
    },
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    tokens: Vec<Token>,
    workouts: Vec<WorkoutRow>,
    entries: Vec<(i64, WorkoutEntry)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_unique(&self, user_id: i64, username: &str, email: &str) -> Result<(), StoreError> {
        for other in self.users.iter().filter(|u| u.id != user_id) {
            if other.username == username {
                return Err(StoreError::Conflict("users_username_key".into()));
            }
            if other.email == email {
                return Err(StoreError::Conflict("users_email_key".into()));
            }
        }
        Ok(())
    }

    fn insert_entries(&mut self, workout_id: i64, entries: &[NewWorkoutEntry]) -> Vec<WorkoutEntry> {
        let now = OffsetDateTime::now_utc();
        let mut inserted = Vec::with_capacity(entries.len());
        for entry in entries {
            let row = WorkoutEntry {
                id: self.next_id(),
                exercise_name: entry.exercise_name.clone(),
                reps: entry.reps,
                sets: entry.sets,
                weight: entry.weight,
                duration_seconds: entry.duration_seconds,
                notes: entry.notes.clone(),
                order_index: entry.order_index,
                created_at: now,
                updated_at: now,
            };
            self.entries.push((workout_id, row.clone()));
            inserted.push(row);
        }
        inserted
    }

    fn entries_of(&self, workout_id: i64) -> Vec<WorkoutEntry> {
        self.entries
            .iter()
            .filter(|(owner, _)| *owner == workout_id)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

/// Same constraints as the `workout_entries` CHECKs.
fn check_entries(entries: &[NewWorkoutEntry]) -> Result<(), StoreError> {
    let violates = |e: &NewWorkoutEntry| {
        e.sets <= 0
            || e.reps.is_some_and(|r| r < 0)
            || e.duration_seconds.is_some_and(|d| d < 0)
            || e.weight.is_some_and(|w| w < 0.0)
    };
    if entries.iter().any(violates) {
        return Err(StoreError::Internal(anyhow::anyhow!(
            "violates check constraint on workout_entries"
        )));
    }
    Ok(())
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store poisoned")
    }

    pub fn entry_count(&self, workout_id: i64) -> usize {
        self.lock().entries_of(workout_id).len()
    }

    pub fn token_count(&self, user_id: i64) -> usize {
        self.lock().tokens.iter().filter(|t| t.user_id == user_id).count()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.lock();
        t.check_unique(0, &user.username, &user.email)?;
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: t.next_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            bio: user.bio,
            created_at: now,
            updated_at: now,
        };
        t.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.username == username).cloned())
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut t = self.lock();
        t.check_unique(user.id, &user.username, &user.email)?;
        let stored = t
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::NotFound)?;
        *stored = User {
            created_at: stored.created_at,
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        if t.users.len() == before {
            return Err(StoreError::NotFound);
        }
        t.tokens.retain(|tok| tok.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        let mut t = self.lock();
        if !t.users.iter().any(|u| u.id == token.user_id) {
            return Err(StoreError::Internal(anyhow::anyhow!(
                "violates foreign key constraint tokens_user_id_fkey"
            )));
        }
        t.tokens.push(token.clone());
        Ok(())
    }

    async fn find_user(
        &self,
        scope: &str,
        hash: &[u8],
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let t = self.lock();
        let owner = t
            .tokens
            .iter()
            .find(|tok| tok.hash == hash && tok.scope == scope && tok.expiry > now)
            .map(|tok| tok.user_id);
        Ok(owner.and_then(|id| t.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn delete_all_for_user(&self, user_id: i64, scope: &str) -> Result<u64, StoreError> {
        let mut t = self.lock();
        let before = t.tokens.len();
        t.tokens.retain(|tok| !(tok.user_id == user_id && tok.scope == scope));
        Ok((before - t.tokens.len()) as u64)
    }
}

#[async_trait]
impl WorkoutStore for MemoryStore {
    async fn create(&self, workout: NewWorkout) -> Result<Workout, StoreError> {
        check_entries(&workout.entries)?;
        let mut t = self.lock();
        let now = OffsetDateTime::now_utc();
        let row = WorkoutRow {
            id: t.next_id(),
            title: workout.title,
            description: workout.description,
            duration_minutes: workout.duration_minutes,
            calories_burned: workout.calories_burned,
            created_at: now,
            updated_at: now,
        };
        t.workouts.push(row.clone());
        let entries = t.insert_entries(row.id, &workout.entries);
        Ok(row.with_entries(entries))
    }

    async fn get_by_id(&self, id: i64) -> Result<Workout, StoreError> {
        let t = self.lock();
        let row = t
            .workouts
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        Ok(row.with_entries(t.entries_of(id)))
    }

    async fn update(&self, id: i64, changes: WorkoutChanges) -> Result<Workout, StoreError> {
        if let Some(entries) = &changes.entries {
            check_entries(entries)?;
        }
        let mut t = self.lock();
        let row = {
            let stored = t
                .workouts
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or(StoreError::NotFound)?;
            stored.title = changes.title;
            stored.description = changes.description;
            stored.duration_minutes = changes.duration_minutes;
            stored.calories_burned = changes.calories_burned;
            stored.updated_at = OffsetDateTime::now_utc();
            stored.clone()
        };
        let entries = match &changes.entries {
            Some(replacement) => {
                t.entries.retain(|(owner, _)| *owner != id);
                t.insert_entries(id, replacement)
            }
            None => t.entries_of(id),
        };
        Ok(row.with_entries(entries))
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let before = t.workouts.len();
        t.workouts.retain(|w| w.id != id);
        if t.workouts.len() == before {
            return Err(StoreError::NotFound);
        }
        t.entries.retain(|(owner, _)| *owner != id);
        Ok(())
    }
}

/// Delegates to a [`MemoryStore`] but fails the chosen token operations.
pub struct FaultyTokens {
    inner: Arc<MemoryStore>,
    fail_lookup: bool,
    fail_revoke: bool,
}

impl FaultyTokens {
    pub fn failing_lookup(inner: Arc<MemoryStore>) -> Self {
        Self { inner, fail_lookup: true, fail_revoke: false }
    }

    pub fn failing_revoke(inner: Arc<MemoryStore>) -> Self {
        Self { inner, fail_lookup: false, fail_revoke: true }
    }
}

#[async_trait]
impl TokenStore for FaultyTokens {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        self.inner.insert(token).await
    }

    async fn find_user(
        &self,
        scope: &str,
        hash: &[u8],
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        if self.fail_lookup {
            return Err(StoreError::Internal(anyhow::anyhow!("connection reset")));
        }
        self.inner.find_user(scope, hash, now).await
    }

    async fn delete_all_for_user(&self, user_id: i64, scope: &str) -> Result<u64, StoreError> {
        if self.fail_revoke {
            return Err(StoreError::Internal(anyhow::anyhow!("connection reset")));
        }
        self.inner.delete_all_for_user(user_id, scope).await
    }
}

/// Stores a user directly, bypassing registration and password hashing.
pub async fn seed_user(store: &dyn UserStore, username: &str) -> User {
    store
        .create(NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "not-a-real-hash".into(),
            bio: None,
        })
        .await
        .expect("seed user")
}

/// Seeds `username` and issues an authentication token for them.
pub async fn authenticated(state: &AppState, username: &str) -> (User, String) {
    let user = seed_user(state.users.as_ref(), username).await;
    let token = state
        .tokens
        .issue(user.id, state.config.tokens.ttl(), SCOPE_AUTHENTICATION)
        .await
        .expect("issue token");
    (user, token.plaintext)
}

pub fn test_app() -> (Router, AppState) {
    let (app, state, _store) = test_app_with_store();
    (app, state)
}

pub fn test_app_with_store() -> (Router, AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let state = AppState::fake_with(store.clone());
    (build_app(state.clone()), state, store)
}

/// Like [`test_app_with_store`], with the token store swapped for a [`FaultyTokens`].
pub fn test_app_with_token_store(
    make: fn(Arc<MemoryStore>) -> FaultyTokens,
) -> (Router, AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let mut state = AppState::fake_with(store.clone());
    state.tokens = TokenIssuer::new(Arc::new(make(store.clone())));
    (build_app(state.clone()), state, store)
}

/// Sends one request through the full router. Empty bodies come back as `Value::Null`.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deleting_a_user_drops_their_tokens() {
        let (_app, state, store) = test_app_with_store();
        let (user, _token) = authenticated(&state, "frank").await;
        assert_eq!(store.token_count(user.id), 1);

        state.users.delete(user.id).await.unwrap();
        assert_eq!(store.token_count(user.id), 0);
    }

    #[tokio::test]
    async fn failing_entry_leaves_nothing_behind() {
        let store = MemoryStore::default();
        let bad = NewWorkout {
            title: "Broken".into(),
            description: String::new(),
            duration_minutes: 10,
            calories_burned: 10,
            entries: vec![NewWorkoutEntry {
                exercise_name: "Squat".into(),
                reps: None,
                sets: 0,
                weight: None,
                duration_seconds: None,
                notes: String::new(),
                order_index: 1,
            }],
        };
        assert!(WorkoutStore::create(&store, bad).await.is_err());
        assert!(store.lock().workouts.is_empty());
        assert!(store.lock().entries.is_empty());
    }
}
