use axum::Router;

use crate::state::AppState;

mod dto;
pub mod extractors;
pub mod guard;
pub mod handlers;
pub mod jwt;
pub mod repo;
pub mod service;

pub use dto::Role;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
