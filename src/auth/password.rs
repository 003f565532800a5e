use anyhow::Context;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(password_hash::Error),

    #[error("malformed password digest: {0}")]
    MalformedDigest(password_hash::Error),

    #[error("failed to compare passwords: {0}")]
    Compare(password_hash::Error),
}

/// Argon2id with the crate's default cost parameters; each digest carries its own salt.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hash(e)
        })?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on a plain mismatch; `Err` only when the stored digest cannot be used.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        PasswordError::MalformedDigest(e)
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            error!(error = %e, "argon2 verify_password error");
            Err(PasswordError::Compare(e))
        }
    }
}

/// Runs [`hash_password`] on the blocking pool.
pub async fn spawn_hash(plain: String) -> anyhow::Result<String> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("password hashing task")??;
    Ok(hash)
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn spawn_verify(plain: String, hash: String) -> anyhow::Result<bool> {
    let matches = tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("password verification task")??;
    Ok(matches)
}

lazy_static! {
    /// Digest checked when the username is unknown, so both login paths pay one Argon2 verify.
    static ref DUMMY_DIGEST: String =
        hash_password("fitlog-unknown-user").unwrap_or_default();
}

/// Verifies `plain` against a throwaway digest and discards the outcome.
pub async fn spawn_verify_dummy(plain: String) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || {
        let _ = verify_password(&plain, &DUMMY_DIGEST);
    })
    .await
    .context("dummy password verification task")?;
    Ok(())
}
