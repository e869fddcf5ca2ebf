//! Table API: generic point reads and mutations against one table, with read-time embeds.

mod memory;
mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

use crate::catalog::{EntityDef, OrderSpec};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// One row as column name -> JSON value.
pub type Row = HashMap<String, Value>;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// An embed resolved against the catalog: attach `columns` of the `related` row whose
/// `their_key` equals our `our_key`, under `name`. Null when no such row exists.
#[derive(Clone, Debug)]
pub struct EmbedSelect<'a> {
    pub name: &'a str,
    pub related: &'a EntityDef,
    pub our_key: &'a str,
    pub their_key: &'a str,
    pub columns: &'a [&'static str],
}

#[derive(Clone, Debug)]
pub enum SearchTarget<'a> {
    Own(&'a str),
    Related {
        related: &'a EntityDef,
        our_key: &'a str,
        their_key: &'a str,
        column: &'a str,
    },
}

/// Case-insensitive substring match of `term` against any of `targets`.
#[derive(Clone, Debug)]
pub struct SearchSelect<'a> {
    pub term: String,
    pub targets: Vec<SearchTarget<'a>>,
}

#[derive(Clone, Debug)]
pub struct SelectQuery<'a> {
    /// Exact-match filters, ANDed.
    pub filters: Vec<(String, Value)>,
    pub embeds: Vec<EmbedSelect<'a>>,
    pub search: Option<SearchSelect<'a>>,
    pub order: OrderSpec,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl<'a> SelectQuery<'a> {
    /// Plain select by one column, no embeds, in default order.
    pub fn by_column(entity: &EntityDef, column: &str, value: Value) -> Self {
        SelectQuery {
            filters: vec![(column.to_string(), value)],
            embeds: Vec::new(),
            search: None,
            order: entity.default_order.clone(),
            limit: None,
            offset: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn select(&self, entity: &EntityDef, query: &SelectQuery<'_>) -> Result<Vec<Value>, AppError>;

    /// Insert one row and return it as stored (server-assigned key and timestamp included).
    async fn insert(&self, entity: &EntityDef, row: &Row) -> Result<Value, AppError>;

    /// Apply `patch` to the row whose primary key equals `key`. Returns rows affected.
    async fn update(&self, entity: &EntityDef, key: &Value, patch: &Row) -> Result<u64, AppError>;

    /// Delete rows where `column` equals `value`. Returns rows affected.
    async fn delete_where(&self, entity: &EntityDef, column: &str, value: &Value) -> Result<u64, AppError>;

    async fn ping(&self) -> Result<(), AppError>;

    /// Weighted-average unit cost of a raw material, computed by the backend.
    async fn ingredient_average_cost(&self, raw_material_id: i64) -> Result<Option<f64>, AppError>;
}
