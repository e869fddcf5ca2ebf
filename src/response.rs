//! `{data, meta}` bodies for entity endpoints. Lists describe the page they cover so clients can
//! ask for the next one.

use crate::backend::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::catalog::EntityKind;
use crate::service::ListQuery;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct PageMeta {
    /// Route segment of the listed entity (`raw-materials`).
    pub entity: &'static str,
    pub count: usize,
    pub limit: u32,
    pub offset: u32,
}

impl PageMeta {
    pub fn new(kind: EntityKind, query: &ListQuery, count: usize) -> Self {
        PageMeta {
            entity: kind.path_segment(),
            count,
            limit: query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
            offset: query.offset.unwrap_or(0),
        }
    }
}

pub type EntityResponse<T> = (StatusCode, Json<Envelope<T>>);

/// 201 with the stored row, embeds attached.
pub fn created(row: Value) -> EntityResponse<Value> {
    (StatusCode::CREATED, Json(Envelope { data: row, meta: None }))
}

pub fn found<T: Serialize>(data: T) -> EntityResponse<T> {
    (StatusCode::OK, Json(Envelope { data, meta: None }))
}

pub fn page(kind: EntityKind, query: &ListQuery, rows: Vec<Value>) -> EntityResponse<Vec<Value>> {
    let meta = PageMeta::new(kind, query, rows.len());
    (
        StatusCode::OK,
        Json(Envelope {
            data: rows,
            meta: Some(meta),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_meta_reports_the_effective_window() {
        let meta = PageMeta::new(EntityKind::RawMaterial, &ListQuery::new(), 0);
        assert_eq!(meta.entity, "raw-materials");
        assert_eq!((meta.limit, meta.offset), (DEFAULT_LIMIT, 0));

        let query = ListQuery::new().limit(5000).offset(20);
        let meta = PageMeta::new(EntityKind::Sale, &query, 3);
        assert_eq!((meta.count, meta.limit, meta.offset), (3, MAX_LIMIT, 20));
    }

    #[test]
    fn single_rows_carry_no_meta() {
        let (status, Json(body)) = created(json!({"id": 1}));
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"data": {"id": 1}}));

        let (status, Json(body)) = page(EntityKind::Product, &ListQuery::new(), vec![json!({"id": 1})]);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(body).unwrap()["meta"],
            json!({"entity": "products", "count": 1, "limit": 100, "offset": 0})
        );
    }
}
