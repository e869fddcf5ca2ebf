//! Table API against PostgreSQL.

use crate::backend::{Row, SelectQuery, TableBackend};
use crate::catalog::EntityDef;
use crate::error::AppError;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    schema: String,
}

impl PgBackend {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgBackend {
            pool,
            schema: schema.into(),
        }
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TableBackend for PgBackend {
    async fn select(&self, entity: &EntityDef, query: &SelectQuery<'_>) -> Result<Vec<Value>, AppError> {
        let q = sql::select(&self.schema, entity, query);
        self.query_many(&q).await
    }

    async fn insert(&self, entity: &EntityDef, row: &Row) -> Result<Value, AppError> {
        let q = sql::insert(&self.schema, entity, row);
        let mut rows = self.query_many(&q).await?;
        rows.pop().ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, entity: &EntityDef, key: &Value, patch: &Row) -> Result<u64, AppError> {
        let q = sql::update(&self.schema, entity, key, patch);
        self.execute(&q).await
    }

    async fn delete_where(&self, entity: &EntityDef, column: &str, value: &Value) -> Result<u64, AppError> {
        let q = sql::delete_where(&self.schema, entity, column, value);
        self.execute(&q).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    async fn ingredient_average_cost(&self, raw_material_id: i64) -> Result<Option<f64>, AppError> {
        let q = sql::ingredient_average_cost(&self.schema, raw_material_id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Option<f64>>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.fetch_one(&self.pool).await?)
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
