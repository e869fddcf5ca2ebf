//! Entity CRUD routes. Handlers resolve the entity from the path segment.

use crate::handlers::entity::{average_cost, create, delete as delete_handler, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route(
            "/:path_segment/:id",
            get(read).patch(update).delete(delete_handler),
        )
        .route("/:path_segment/:id/average-cost", get(average_cost))
        .with_state(state)
}
