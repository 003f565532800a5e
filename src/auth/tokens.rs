//! Opaque bearer tokens.
//!
//! The client receives the base64url plaintext exactly once. Only its SHA-256
//! digest is stored, so a leaked `tokens` table cannot be replayed. A fast hash
//! is enough here: the plaintext carries 256 bits of entropy.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::repo::TokenStore;
use crate::{db::StoreError, users::repo_types::User};

pub const SCOPE_AUTHENTICATION: &str = "authentication";

const TOKEN_BYTES: usize = 32;

/// A freshly issued token. Serializes as `{"token": <plaintext>, "expiry": <rfc3339>}`.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
    #[serde(skip)]
    pub scope: String,
}

pub fn token_digest(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

pub fn generate_token<R>(
    rng: &mut R,
    user_id: i64,
    ttl: Duration,
    scope: &str,
    now: OffsetDateTime,
) -> anyhow::Result<Token>
where
    R: RngCore + CryptoRng,
{
    let expiry = now
        .checked_add(ttl)
        .ok_or_else(|| anyhow::anyhow!("token expiry out of range (ttl {ttl})"))?;
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill_bytes(&mut bytes);
    let plaintext = URL_SAFE_NO_PAD.encode(bytes);
    Ok(Token {
        hash: token_digest(&plaintext),
        plaintext,
        user_id,
        expiry,
        scope: scope.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Unknown, expired and wrong-scope tokens are deliberately indistinguishable.
    #[error("invalid token")]
    Invalid,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues, resolves and revokes tokens against a [`TokenStore`].
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    pub async fn issue(&self, user_id: i64, ttl: Duration, scope: &str) -> Result<Token, StoreError> {
        let token = generate_token(&mut OsRng, user_id, ttl, scope, OffsetDateTime::now_utc())?;
        self.store.insert(&token).await?;
        debug!(user_id, scope, expiry = %token.expiry, "token issued");
        Ok(token)
    }

    /// Finds the owner of a live token in `scope`.
    pub async fn resolve(&self, scope: &str, plaintext: &str) -> Result<User, TokenError> {
        let hash = token_digest(plaintext);
        self.store
            .find_user(scope, &hash, OffsetDateTime::now_utc())
            .await?
            .ok_or(TokenError::Invalid)
    }

    /// Deletes every token of `user_id` in `scope`, returning how many went away.
    pub async fn revoke_all(&self, user_id: i64, scope: &str) -> Result<u64, StoreError> {
        let revoked = self.store.delete_all_for_user(user_id, scope).await?;
        debug!(user_id, scope, revoked, "tokens revoked");
        Ok(revoked)
    }
}
