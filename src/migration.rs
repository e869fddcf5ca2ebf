//! Create the bakery schema from the catalog: tables, constraints and the average-cost function.
//! Statements are idempotent so the server can run them on every start.

use crate::catalog::{Catalog, ColumnDef, ColumnKind, EntityDef, Generated};
use crate::error::{AppError, ConfigError};
use crate::sql::{qualified_table, quoted};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

pub const AVERAGE_COST_FUNCTION: &str = "get_ingredient_average_cost";

/// DDL for `schema`, in dependency order.
pub fn migration_statements(schema: &str, catalog: &Catalog) -> Vec<String> {
    let mut out = vec![format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema))];
    for entity in catalog.entities() {
        out.push(create_table(schema, catalog, entity));
    }
    out.push(average_cost_function(schema));
    out
}

fn column_ddl(entity: &EntityDef, col: &ColumnDef) -> String {
    let mut def = format!("{} {}", quoted(col.name), col.kind.ddl_type());
    if col.name == entity.pk {
        def.push_str(" PRIMARY KEY");
    } else if col.required || col.name == entity.created_column {
        def.push_str(" NOT NULL");
    }
    if col.unique && col.name != entity.pk {
        def.push_str(" UNIQUE");
    }
    match (col.generated, col.kind) {
        (Some(Generated::Server), ColumnKind::Timestamptz) => def.push_str(" DEFAULT now()"),
        (Some(Generated::UuidIfAbsent), ColumnKind::Uuid) => def.push_str(" DEFAULT gen_random_uuid()"),
        (Some(Generated::UuidIfAbsent), ColumnKind::Text) => def.push_str(" DEFAULT gen_random_uuid()::text"),
        _ => {}
    }
    if let Some(min) = col.rule.minimum {
        def.push_str(&format!(" CHECK ({} >= {})", quoted(col.name), min));
    }
    if let Some(max) = col.rule.maximum {
        def.push_str(&format!(" CHECK ({} <= {})", quoted(col.name), max));
    }
    def
}

fn create_table(schema: &str, catalog: &Catalog, entity: &EntityDef) -> String {
    let mut defs: Vec<String> = entity.columns.iter().map(|c| column_ddl(entity, c)).collect();
    for r in &entity.references {
        let target = catalog.entity(r.target);
        defs.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            quoted(&format!("{}_{}_fkey", entity.table, r.column)),
            quoted(r.column),
            qualified_table(schema, target.table),
            quoted(r.target_column),
            r.on_delete.sql()
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified_table(schema, entity.table),
        defs.join(", ")
    )
}

fn average_cost_function(schema: &str) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {}.{}(p_raw_material_id BIGINT) RETURNS NUMERIC \
         LANGUAGE sql STABLE AS $$ \
         SELECT SUM(total_cost) / NULLIF(SUM(quantity), 0) FROM {} WHERE raw_material_id = p_raw_material_id \
         $$",
        quoted(schema),
        quoted(AVERAGE_COST_FUNCTION),
        qualified_table(schema, "purchases")
    )
}

pub async fn apply_migrations(pool: &PgPool, schema: &str, catalog: &Catalog) -> Result<(), AppError> {
    for sql in migration_statements(schema, catalog) {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await?;
    }
    tracing::info!(schema, tables = catalog.entities().len(), "migrations applied");
    Ok(())
}

/// Create the database named in `database_url` when it does not exist, connecting through the
/// `postgres` maintenance database.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Load(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| ConfigError::Load("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements() -> Vec<String> {
        migration_statements("public", &Catalog::bakery().unwrap())
    }

    #[test]
    fn tables_follow_reference_order() {
        let stmts = statements();
        assert_eq!(stmts[0], "CREATE SCHEMA IF NOT EXISTS \"public\"");
        let pos = |table: &str| {
            stmts
                .iter()
                .position(|s| s.starts_with(&format!("CREATE TABLE IF NOT EXISTS \"public\".\"{}\"", table)))
                .unwrap()
        };
        assert!(pos("units_of_measure") < pos("raw_materials"));
        assert!(pos("raw_materials") < pos("recipes"));
        assert!(pos("user") < pos("user_rol"));
        assert!(pos("rol") < pos("user_rol"));
    }

    #[test]
    fn product_table_ddl() {
        let stmts = statements();
        let products = stmts.iter().find(|s| s.contains("\"public\".\"products\" (")).unwrap();
        assert_eq!(
            products,
            "CREATE TABLE IF NOT EXISTS \"public\".\"products\" (\"id\" BIGSERIAL PRIMARY KEY, \
             \"name\" TEXT NOT NULL, \"description\" TEXT, \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT now())"
        );
    }

    #[test]
    fn delete_policies_are_explicit() {
        let stmts = statements();
        let recipes = stmts.iter().find(|s| s.contains("\"public\".\"recipes\" (")).unwrap();
        assert!(recipes.contains(
            "FOREIGN KEY (\"product_id\") REFERENCES \"public\".\"products\" (\"id\") ON DELETE RESTRICT"
        ));
        assert!(recipes.contains("\"required_quantity\" NUMERIC NOT NULL CHECK (\"required_quantity\" >= 0)"));
        let user_rol = stmts.iter().find(|s| s.contains("\"public\".\"user_rol\" (")).unwrap();
        assert!(user_rol.contains(
            "FOREIGN KEY (\"user_id\") REFERENCES \"public\".\"user\" (\"user_id\") ON DELETE CASCADE"
        ));
        assert!(user_rol.contains(
            "FOREIGN KEY (\"rol_id\") REFERENCES \"public\".\"rol\" (\"rol_id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn user_and_role_keys() {
        let stmts = statements();
        let user = stmts.iter().find(|s| s.contains("\"public\".\"user\" (")).unwrap();
        assert!(user.contains("\"user_id\" UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
        assert!(user.contains("\"user_name\" TEXT NOT NULL UNIQUE"));
        assert!(!user.contains("password"));
        let rol = stmts.iter().find(|s| s.contains("\"public\".\"rol\" (")).unwrap();
        assert!(rol.contains("\"rol_id_ext\" TEXT UNIQUE DEFAULT gen_random_uuid()::text"));
    }

    #[test]
    fn average_cost_function_is_last() {
        let stmts = statements();
        let last = stmts.last().unwrap();
        assert!(last.starts_with(
            "CREATE OR REPLACE FUNCTION \"public\".\"get_ingredient_average_cost\"(p_raw_material_id BIGINT)"
        ));
    }

    #[test]
    fn admin_url_targets_postgres() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/bakery?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "bakery");
    }
}
