//! List options: filters, embeds, ordering, search and paging.

use crate::catalog::{ColumnKind, EntityDef, OrderSpec, SortDirection};
use crate::error::AppError;
use serde_json::Value;
use std::collections::HashMap;

/// Which embeds to attach to listed rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum EmbedSelection {
    /// Every embed the entity declares.
    #[default]
    Default,
    None,
    Only(Vec<String>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub embed: EmbedSelection,
    /// Falls back to the entity's default order.
    pub order: Option<OrderSpec>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: &str, value: Value) -> Self {
        self.filters.push((column.to_string(), value));
        self
    }

    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Parse query-string parameters: `limit`, `offset`, `order=col[.asc|.desc]`,
    /// `embed=a,b` (empty for none), `q=term`, and `column=value` exact filters. Parameters
    /// naming no column are ignored; filter values must parse as the column's kind.
    pub fn from_params(entity: &EntityDef, params: &HashMap<String, String>) -> Result<Self, AppError> {
        let mut query = ListQuery::new();
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        for k in keys {
            let v = &params[k];
            match k.as_str() {
                "limit" => {
                    query.limit = Some(
                        v.parse()
                            .map_err(|_| AppError::BadRequest(format!("invalid limit: {}", v)))?,
                    );
                }
                "offset" => {
                    query.offset = Some(
                        v.parse()
                            .map_err(|_| AppError::BadRequest(format!("invalid offset: {}", v)))?,
                    );
                }
                "order" => query.order = Some(parse_order(entity, v)?),
                "embed" => {
                    let names: Vec<String> = v
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                    query.embed = if names.is_empty() {
                        EmbedSelection::None
                    } else {
                        EmbedSelection::Only(names)
                    };
                }
                "q" => {
                    if !v.trim().is_empty() {
                        query.search = Some(v.trim().to_string());
                    }
                }
                _ => {
                    if entity.column(k).is_some() {
                        query.filters.push((k.clone(), query_value_for_column(entity, k, v)?));
                    }
                }
            }
        }
        Ok(query)
    }
}

fn parse_order(entity: &EntityDef, s: &str) -> Result<OrderSpec, AppError> {
    let (column, direction) = match s.rsplit_once('.') {
        Some((c, "asc")) => (c, SortDirection::Asc),
        Some((c, "desc")) => (c, SortDirection::Desc),
        _ => (s, SortDirection::Asc),
    };
    if entity.column(column).is_none() {
        return Err(AppError::BadRequest(format!("unknown order column: {}", column)));
    }
    Ok(OrderSpec {
        column: column.to_string(),
        direction,
    })
}

/// Coerce a query-string value to the column's JSON shape; `null` filters for absent values.
/// A value that cannot be a value of the column is a bad request.
fn query_value_for_column(entity: &EntityDef, col: &str, s: &str) -> Result<Value, AppError> {
    if s == "null" {
        return Ok(Value::Null);
    }
    let Some(kind) = entity.column(col).map(|c| c.kind) else {
        return Ok(Value::String(s.to_string()));
    };
    let invalid = |expected: &str| AppError::BadRequest(format!("{} filter must be {}: {}", col, expected, s));
    match kind {
        ColumnKind::Text => Ok(Value::String(s.to_string())),
        ColumnKind::Uuid => uuid::Uuid::parse_str(s)
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| invalid("a UUID")),
        ColumnKind::BigInt | ColumnKind::BigSerial => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid("an integer")),
        ColumnKind::Numeric => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("a number")),
        ColumnKind::Date => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|_| Value::String(s.to_string()))
            .map_err(|_| invalid("a date (YYYY-MM-DD)")),
        ColumnKind::Timestamptz => chrono::DateTime::parse_from_rfc3339(s)
            .map(|_| Value::String(s.to_string()))
            .map_err(|_| invalid("an RFC 3339 timestamp")),
    }
}
