//! Fee collection (mandatory) and donation (voluntary) campaigns with per-household payments.

mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use repo_types::{Campaign, CampaignPayment, CampaignType, PaymentStatus};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
