use serde::{Deserialize, Serialize};

use super::tokens::Token;

/// Request body for `POST /tokens/`.
#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub username: String,
    pub password: String,
}

/// Response for a freshly issued token; the only place the plaintext ever appears.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: Token,
}
