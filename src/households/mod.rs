mod dto;
pub mod handlers;
pub mod membership;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use membership::{HouseholdMembership, MembershipError, MembershipType};
pub use repo_types::{Household, HouseholdType};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
