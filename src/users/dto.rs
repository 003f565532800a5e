use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::repo_types::User;
use crate::error::AppError;

const MAX_USERNAME_LEN: usize = 50;
const MAX_EMAIL_LEN: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email)
}

fn normalize_username(raw: &str) -> Result<String, AppError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::validation("username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::validation("username is too long"));
    }
    Ok(username.to_string())
}

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::validation("email is required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("invalid email format"));
    }
    Ok(email)
}

/// Request body for `POST /users/`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub bio: Option<String>,
}

impl RegisterRequest {
    /// Trims and lower-cases in place, then checks required fields.
    pub fn normalize(&mut self) -> Result<(), AppError> {
        self.username = normalize_username(&self.username)?;
        self.email = normalize_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AppError::validation("password is required"));
        }
        Ok(())
    }
}

/// Request body for `PUT /users/{id}/`; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
}

impl UpdateUserRequest {
    /// Copies the supplied profile fields onto `user`. The password is handled by the caller.
    pub fn merge_into(&self, user: &mut User) -> Result<(), AppError> {
        if let Some(username) = &self.username {
            user.username = normalize_username(username)?;
        }
        if let Some(email) = &self.email {
            user.email = normalize_email(email)?;
        }
        if let Some(bio) = &self.bio {
            user.bio = Some(bio.clone());
        }
        if matches!(self.password.as_deref(), Some("")) {
            return Err(AppError::validation("password must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: Option<User>,
}
