//! Entity CRUD handlers: list, create, read, update, delete, plus raw-material average cost.

use crate::catalog::{ColumnKind, EntityDef, EntityKind};
use crate::error::AppError;
use crate::extractors::AuthSession;
use crate::response::{created, found, page};
use crate::service::{ListQuery, Patch};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

fn parse_id(id_str: &str, entity: &EntityDef) -> Result<Value, AppError> {
    Ok(match entity.pk_column().kind {
        ColumnKind::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        ColumnKind::BigSerial | ColumnKind::BigInt => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        _ => Value::String(id_str.to_string()),
    })
}

fn body_to_map(value: Value) -> Result<HashMap<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn entity_for<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a EntityDef, AppError> {
    state
        .catalog
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(path_segment.to_string()))
}

pub async fn list(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let query = ListQuery::from_params(entity, &params)?;
    let rows = state.data_access(session).list(entity.kind, &query).await?;
    Ok(page(entity.kind, &query, rows))
}

pub async fn create(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let body = body_to_map(body)?;
    let row = state.data_access(session).create(entity.kind, body).await?;
    Ok(created(row))
}

pub async fn read(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let id = parse_id(&id_str, entity)?;
    let row = state.data_access(session).get(entity.kind, &id).await?;
    Ok(found(row))
}

pub async fn update(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path((path_segment, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let id = parse_id(&id_str, entity)?;
    let patch = Patch::new(entity, body_to_map(body)?)?;
    state.data_access(session).update(entity.kind, &id, &patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    let id = parse_id(&id_str, entity)?;
    state.data_access(session).delete(entity.kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /raw-materials/:id/average-cost
pub async fn average_cost(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment)?;
    if entity.kind != EntityKind::RawMaterial {
        return Err(AppError::NotFound(format!("{}/{}/average-cost", path_segment, id_str)));
    }
    let id: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
    let cost = state.data_access(session).ingredient_average_cost(id).await?;
    Ok(found(json!({ "raw_material_id": id, "average_cost": cost })))
}
