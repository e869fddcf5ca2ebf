//! Console pages: the route gate decides, pages describe their list endpoint.

use crate::extractors::OptionalSession;
use crate::session::{route_decision, RouteDecision, LOGIN_ROUTE};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Serialize)]
struct LoginPage<'a> {
    page: &'static str,
    providers: &'a [String],
}

#[derive(Serialize)]
struct EntityPage {
    page: &'static str,
    api: String,
    embeds: Vec<&'static str>,
    columns: Vec<&'static str>,
    searchable: bool,
}

fn gate(path: &str, session: &OptionalSession) -> Option<Response> {
    match route_decision(path, session.0.is_some()) {
        RouteDecision::Allow => None,
        RouteDecision::Redirect(to) => Some(Redirect::to(to).into_response()),
    }
}

pub async fn root(session: OptionalSession) -> Response {
    gate("/", &session).unwrap_or_else(|| Redirect::to(LOGIN_ROUTE).into_response())
}

pub async fn login(State(state): State<AppState>, session: OptionalSession) -> Response {
    if let Some(redirect) = gate(LOGIN_ROUTE, &session) {
        return redirect;
    }
    Json(LoginPage {
        page: "login",
        providers: &state.login_providers,
    })
    .into_response()
}

pub async fn page(State(state): State<AppState>, session: OptionalSession, Path(segment): Path<String>) -> Response {
    let path = format!("/{}", segment);
    if let Some(redirect) = gate(&path, &session) {
        return redirect;
    }
    let Some(entity) = state.catalog.entity_by_path(&segment) else {
        return Redirect::to(LOGIN_ROUTE).into_response();
    };
    Json(EntityPage {
        page: entity.kind.path_segment(),
        api: format!("{}/{}", API_PREFIX, entity.kind.path_segment()),
        embeds: entity.embeds.iter().map(|e| e.name).collect(),
        columns: entity.columns.iter().map(|c| c.name).collect(),
        searchable: !entity.search.is_empty(),
    })
    .into_response()
}
