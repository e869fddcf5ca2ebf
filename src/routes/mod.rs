//! Routers: common probes, console pages, entity API.

mod common;
mod console;
mod entity;

pub use common::common_routes;
pub use console::console_routes;
pub use entity::entity_routes;

use crate::handlers::console::API_PREFIX;
use crate::state::AppState;
use axum::Router;

/// The whole service: probes and console pages at the root, the entity API under `/api/v1`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(console_routes(state.clone()))
        .nest(API_PREFIX, entity_routes(state))
}
