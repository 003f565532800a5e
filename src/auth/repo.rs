use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::tokens::Token;
use crate::{db::StoreError, users::repo_types::User};

/// Persistence for token digests. Rows are never updated, only inserted and bulk-deleted.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), StoreError>;

    /// Owner of the token with digest `hash` in `scope`, if its expiry is after `now`.
    async fn find_user(
        &self,
        scope: &str,
        hash: &[u8],
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;

    async fn delete_all_for_user(&self, user_id: i64, scope: &str) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct PgTokenStore {
    db: PgPool,
}

impl PgTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (hash, user_id, expiry, scope)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.hash)
        .bind(token.user_id)
        .bind(token.expiry)
        .bind(&token.scope)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_user(
        &self,
        scope: &str,
        hash: &[u8],
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.bio, u.created_at, u.updated_at
              FROM users u
              JOIN tokens t ON t.user_id = u.id
             WHERE t.hash = $1
               AND t.scope = $2
               AND t.expiry > $3
            "#,
        )
        .bind(hash)
        .bind(scope)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_all_for_user(&self, user_id: i64, scope: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1 AND scope = $2")
            .bind(user_id)
            .bind(scope)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
