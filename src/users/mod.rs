mod dto;
pub mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use dto::{CreateUserRequest, UpdateUserRequest};

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
