use crate::handlers::console::{login, page, root};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn console_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/login", get(login))
        .route("/:page", get(page))
        .with_state(state)
}
