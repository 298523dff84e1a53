pub mod dto;
pub mod handlers;
pub mod renewal;
mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use renewal::compute_renewal_date;

pub fn router() -> Router<AppState> {
    handlers::subscription_routes()
}
