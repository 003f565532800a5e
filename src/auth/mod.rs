use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod repo;
pub mod tokens;

pub fn router() -> Router<AppState> {
    handlers::token_routes()
}
