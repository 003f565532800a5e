//! Bearer-token authentication.
//!
//! [`authenticate`] runs once per request and always leaves an [`Identity`] in the
//! request extensions before the handler runs: `Anonymous` when no
//! `Authorization` header was sent, the token owner otherwise. Handlers pick it
//! up explicitly through [`CurrentUser`] or [`AuthUser`].

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, VARY},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use tracing::{debug, error, warn};

use super::tokens::{TokenError, TokenIssuer, SCOPE_AUTHENTICATION};
use crate::{error::AppError, state::AppState, users::repo_types::User};

#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }
}

/// Extracts the token from `Bearer <token>`; any other shape is a format error.
pub fn bearer_token(value: &HeaderValue) -> Result<&str, AppError> {
    let raw = value.to_str().map_err(|_| AppError::InvalidAuthHeader)?;
    let mut parts = raw.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AppError::InvalidAuthHeader),
    }
}

async fn resolve_identity(tokens: &TokenIssuer, headers: &HeaderMap) -> Result<Identity, AppError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(Identity::Anonymous),
    };

    let plaintext = bearer_token(value).map_err(|e| {
        warn!("malformed authorization header");
        e
    })?;

    match tokens.resolve(SCOPE_AUTHENTICATION, plaintext).await {
        Ok(user) => Ok(Identity::User(user)),
        Err(TokenError::Invalid) => {
            warn!("invalid or expired token");
            Err(AppError::InvalidToken)
        }
        Err(TokenError::Store(e)) => {
            error!(error = %e, "token lookup failed");
            Err(AppError::InvalidToken)
        }
    }
}

fn vary_on_authorization(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(VARY, HeaderValue::from_static("Authorization"));
    response
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_identity(&state.tokens, request.headers()).await {
        Ok(identity) => {
            debug!(anonymous = identity.is_anonymous(), "request identity resolved");
            request.extensions_mut().insert(identity);
            vary_on_authorization(next.run(request).await)
        }
        Err(rejection) => vary_on_authorization(rejection.into_response()),
    }
}

/// The identity attached by [`authenticate`], anonymous or not.
///
/// # Panics
///
/// When the route is not behind [`authenticate`]. That is a wiring bug, not a
/// request error.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(identity) => Ok(CurrentUser(identity.clone())),
            None => panic!("request identity missing: route is not behind the authenticate middleware"),
        }
    }
}

/// A logged-in user; anonymous callers are rejected with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = match CurrentUser::from_request_parts(parts, state).await {
            Ok(current) => current,
            Err(never) => match never {},
        };
        identity
            .user()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::AuthenticationRequired)
    }
}
