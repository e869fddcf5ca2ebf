//! Table API held in process memory. Same read semantics as PostgreSQL; no foreign keys.

use crate::backend::{Row, SearchTarget, SelectQuery, TableBackend};
use crate::catalog::{ColumnKind, EntityDef, Generated, SortDirection};
use crate::error::AppError;
use crate::service::merge_fields;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct MemTable {
    rows: Vec<Map<String, Value>>,
    last_id: i64,
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> AppError {
        AppError::Internal("memory backend lock poisoned".into())
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.parse::<f64>().ok() == n.as_f64()
        }
        _ => a == b,
    }
}

fn cmp_present(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n
            .as_f64()
            .partial_cmp(&m.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(s), Value::String(t)) => s.cmp(t),
        _ => Ordering::Equal,
    }
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn find_related<'t>(
    tables: &'t HashMap<String, MemTable>,
    related: &EntityDef,
    their_key: &str,
    value: &Value,
) -> Option<&'t Map<String, Value>> {
    if value.is_null() {
        return None;
    }
    tables
        .get(related.table)?
        .rows
        .iter()
        .find(|r| r.get(their_key).map(|v| value_eq(v, value)).unwrap_or(false))
}

fn check_unique(
    entity: &EntityDef,
    rows: &[Map<String, Value>],
    candidate: &Map<String, Value>,
    skip: Option<usize>,
) -> Result<(), AppError> {
    for c in entity.columns.iter().filter(|c| c.unique || c.name == entity.pk) {
        let Some(v) = candidate.get(c.name).filter(|v| !v.is_null()) else { continue };
        let taken = rows
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .any(|(_, r)| r.get(c.name).map(|x| value_eq(x, v)).unwrap_or(false));
        if taken {
            return Err(AppError::Constraint(format!(
                "duplicate key value violates unique constraint on {}.{}",
                entity.table, c.name
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn select(&self, entity: &EntityDef, query: &SelectQuery<'_>) -> Result<Vec<Value>, AppError> {
        let tables = self.tables.read().map_err(|_| Self::lock_err())?;
        let Some(table) = tables.get(entity.table) else {
            return Ok(Vec::new());
        };

        let term = query.search.as_ref().map(|s| s.term.to_lowercase());
        let mut matched: Vec<(usize, &Map<String, Value>)> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                query.filters.iter().all(|(col, val)| {
                    if entity.column(col).is_none() {
                        return true;
                    }
                    let cell = row.get(col).unwrap_or(&Value::Null);
                    if val.is_null() {
                        cell.is_null()
                    } else {
                        value_eq(cell, val)
                    }
                })
            })
            .filter(|(_, row)| {
                let (Some(search), Some(term)) = (&query.search, &term) else { return true };
                if search.targets.is_empty() {
                    return true;
                }
                search.targets.iter().any(|t| {
                    let text = match t {
                        SearchTarget::Own(col) => row.get(*col).and_then(as_text),
                        SearchTarget::Related {
                            related,
                            our_key,
                            their_key,
                            column,
                        } => {
                            let key = row.get(*our_key).unwrap_or(&Value::Null);
                            find_related(&tables, related, their_key, key)
                                .and_then(|r| r.get(*column))
                                .and_then(as_text)
                        }
                    };
                    text.map(|s| s.to_lowercase().contains(term.as_str())).unwrap_or(false)
                })
            })
            .collect();

        let col = query.order.column.as_str();
        let desc = query.order.direction == SortDirection::Desc;
        matched.sort_by(|(ia, a), (ib, b)| {
            let va = a.get(col).unwrap_or(&Value::Null);
            let vb = b.get(col).unwrap_or(&Value::Null);
            let primary = match (va.is_null(), vb.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                (false, false) => cmp_present(va, vb),
            };
            let ord = primary.then(ia.cmp(ib));
            if desc {
                ord.reverse()
            } else {
                ord
            }
        });

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.effective_limit() as usize;
        let out = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, row)| {
                let mut obj = Map::new();
                for c in &entity.columns {
                    obj.insert(c.name.to_string(), row.get(c.name).cloned().unwrap_or(Value::Null));
                }
                for emb in &query.embeds {
                    let key = row.get(emb.our_key).unwrap_or(&Value::Null);
                    let embedded = find_related(&tables, emb.related, emb.their_key, key)
                        .map(|r| {
                            let projected: Map<String, Value> = emb
                                .columns
                                .iter()
                                .map(|c| (c.to_string(), r.get(*c).cloned().unwrap_or(Value::Null)))
                                .collect();
                            Value::Object(projected)
                        })
                        .unwrap_or(Value::Null);
                    obj.insert(emb.name.to_string(), embedded);
                }
                Value::Object(obj)
            })
            .collect();
        Ok(out)
    }

    async fn insert(&self, entity: &EntityDef, row: &Row) -> Result<Value, AppError> {
        let mut tables = self.tables.write().map_err(|_| Self::lock_err())?;
        let table = tables.entry(entity.table.to_string()).or_default();
        let mut stored = Map::new();
        let mut next_id = table.last_id;
        for c in &entity.columns {
            let value = match (row.get(c.name), c.generated, c.kind) {
                (Some(v), _, _) => v.clone(),
                (None, Some(Generated::Server), ColumnKind::BigSerial) => {
                    next_id += 1;
                    Value::from(next_id)
                }
                (None, Some(Generated::Server), ColumnKind::Timestamptz) => {
                    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
                }
                _ => Value::Null,
            };
            stored.insert(c.name.to_string(), value);
        }
        check_unique(entity, &table.rows, &stored, None)?;
        table.last_id = next_id;
        table.rows.push(stored.clone());
        Ok(Value::Object(stored))
    }

    async fn update(&self, entity: &EntityDef, key: &Value, patch: &Row) -> Result<u64, AppError> {
        let mut tables = self.tables.write().map_err(|_| Self::lock_err())?;
        let Some(table) = tables.get_mut(entity.table) else { return Ok(0) };
        let Some(pos) = table
            .rows
            .iter()
            .position(|r| r.get(entity.pk).map(|v| value_eq(v, key)).unwrap_or(false))
        else {
            return Ok(0);
        };
        let mut candidate = table.rows[pos].clone();
        merge_fields(entity, &mut candidate, patch);
        check_unique(entity, &table.rows, &candidate, Some(pos))?;
        table.rows[pos] = candidate;
        Ok(1)
    }

    async fn delete_where(&self, entity: &EntityDef, column: &str, value: &Value) -> Result<u64, AppError> {
        let mut tables = self.tables.write().map_err(|_| Self::lock_err())?;
        let Some(table) = tables.get_mut(entity.table) else { return Ok(0) };
        let before = table.rows.len();
        table
            .rows
            .retain(|r| !r.get(column).map(|v| value_eq(v, value)).unwrap_or(false));
        Ok((before - table.rows.len()) as u64)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.tables.read().map(|_| ()).map_err(|_| Self::lock_err())
    }

    /// Σ total_cost / Σ quantity over the raw material's purchases.
    async fn ingredient_average_cost(&self, raw_material_id: i64) -> Result<Option<f64>, AppError> {
        let tables = self.tables.read().map_err(|_| Self::lock_err())?;
        let Some(purchases) = tables.get("purchases") else { return Ok(None) };
        let id = Value::from(raw_material_id);
        let (cost, qty) = purchases
            .rows
            .iter()
            .filter(|r| r.get("raw_material_id").map(|v| value_eq(v, &id)).unwrap_or(false))
            .fold((0.0, 0.0), |(cost, qty), r| {
                let c = r.get("total_cost").and_then(Value::as_f64).unwrap_or(0.0);
                let q = r.get("quantity").and_then(Value::as_f64).unwrap_or(0.0);
                (cost + c, qty + q)
            });
        Ok(if qty > 0.0 { Some(cost / qty) } else { None })
    }
}
