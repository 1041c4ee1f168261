use crate::state::AppState;
use axum::Router;

pub mod authenticator;
mod dto;
pub(crate) mod extractors;
pub mod guard;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod service;
pub mod session;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
