use crate::state::AppState;
use axum::Router;

pub mod credentials;
mod dto;
pub mod error;
pub mod federated;
pub mod handlers;
pub mod password;
pub mod redirect;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
