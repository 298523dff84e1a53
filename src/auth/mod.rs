use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod verification;

pub use claims::Claims;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
