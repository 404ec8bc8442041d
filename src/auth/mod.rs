use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod ledger;
pub mod password;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
