pub mod dto;
pub mod handlers;
pub mod pricing;
pub mod validation;
pub mod wizard;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
