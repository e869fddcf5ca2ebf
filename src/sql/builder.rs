//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from entity descriptors.

use crate::backend::{Row, SearchTarget, SelectQuery};
use crate::catalog::{ColumnKind, EntityDef};
use serde_json::Value;

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from the catalog).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder cast to `kind`.
    fn push_param(&mut self, v: Value, kind: ColumnKind) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), kind.pg_type())
    }
}

fn column_kind(entity: &EntityDef, col: &str) -> ColumnKind {
    entity.column(col).map(|c| c.kind).unwrap_or(ColumnKind::Text)
}

/// SELECT list; numeric as float8 so rows decode to JSON numbers.
fn select_column_list(entity: &EntityDef, alias: Option<&str>) -> String {
    entity
        .columns
        .iter()
        .map(|c| {
            let q = quoted(c.name);
            let expr = match alias {
                Some(a) => format!("{}.{}", a, q),
                None => q.clone(),
            };
            match c.kind {
                ColumnKind::Numeric => format!("{}::float8 AS {}", expr, q),
                _ if alias.is_some() => format!("{} AS {}", expr, q),
                _ => expr,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE metacharacters and wrap in `%...%`.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// SELECT with embeds in a single query: main table aliased as "main", each embed as a
/// scalar row_to_json subquery (NULL when the referenced row is gone).
pub fn select(schema: &str, entity: &EntityDef, query: &SelectQuery<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table);

    let mut select_parts = vec![select_column_list(entity, Some(MAIN_ALIAS))];
    for emb in &query.embeds {
        let rel_table = qualified_table(schema, emb.related.table);
        let rel_cols = emb
            .columns
            .iter()
            .map(|c| quoted(c))
            .collect::<Vec<_>>()
            .join(", ");
        select_parts.push(format!(
            "(SELECT row_to_json(sub) FROM (SELECT {} FROM {} WHERE {} = {}.{}) sub) AS {}",
            rel_cols,
            rel_table,
            quoted(emb.their_key),
            MAIN_ALIAS,
            quoted(emb.our_key),
            quoted(emb.name)
        ));
    }

    let mut where_parts = Vec::new();
    for (col, val) in &query.filters {
        if entity.column(col).is_none() {
            continue;
        }
        if val.is_null() {
            where_parts.push(format!("{}.{} IS NULL", MAIN_ALIAS, quoted(col)));
            continue;
        }
        let ph = q.push_param(val.clone(), column_kind(entity, col));
        where_parts.push(format!("{}.{} = {}", MAIN_ALIAS, quoted(col), ph));
    }
    if let Some(search) = &query.search {
        if !search.targets.is_empty() {
            let ph = q.push_param(Value::String(like_pattern(&search.term)), ColumnKind::Text);
            let ors: Vec<String> = search
                .targets
                .iter()
                .map(|t| match t {
                    SearchTarget::Own(col) => format!("{}.{}::text ILIKE {}", MAIN_ALIAS, quoted(col), ph),
                    SearchTarget::Related {
                        related,
                        our_key,
                        their_key,
                        column,
                    } => format!(
                        "(SELECT {} FROM {} WHERE {} = {}.{})::text ILIKE {}",
                        quoted(column),
                        qualified_table(schema, related.table),
                        quoted(their_key),
                        MAIN_ALIAS,
                        quoted(our_key),
                        ph
                    ),
                })
                .collect();
            where_parts.push(format!("({})", ors.join(" OR ")));
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let dir = query.order.direction.sql();
    let order_clause = if query.order.column == entity.pk {
        format!(" ORDER BY {}.{} {}", MAIN_ALIAS, quoted(entity.pk), dir)
    } else {
        format!(
            " ORDER BY {}.{} {} NULLS LAST, {}.{} {}",
            MAIN_ALIAS,
            quoted(&query.order.column),
            dir,
            MAIN_ALIAS,
            quoted(entity.pk),
            dir
        )
    };
    let limit_clause = format!(" LIMIT {}", query.effective_limit());
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();

    q.sql = format!(
        "SELECT {} FROM {} {}{}{}{}{}",
        select_parts.join(", "),
        table,
        MAIN_ALIAS,
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

/// INSERT of the columns present in `row`, in catalog order. Absent columns take the DB default.
pub fn insert(schema: &str, entity: &EntityDef, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let Some(val) = row.get(c.name) else { continue };
        placeholders.push(q.push_param(val.clone(), c.kind));
        cols.push(quoted(c.name));
    }
    let returning = select_column_list(entity, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by primary key: SET only columns present in `patch` (and in the entity).
/// An empty patch still touches the row so the affected count reports existence.
pub fn update(schema: &str, entity: &EntityDef, key: &Value, patch: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table);
    let pk = entity.pk_column();
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.name == entity.pk {
            continue;
        }
        let Some(v) = patch.get(c.name) else { continue };
        let rhs = q.push_param(v.clone(), c.kind);
        sets.push(format!("{} = {}", quoted(c.name), rhs));
    }
    if sets.is_empty() {
        sets.push(format!("{} = {}", quoted(pk.name), quoted(pk.name)));
    }
    let id_ph = q.push_param(key.clone(), pk.kind);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        table,
        sets.join(", "),
        quoted(pk.name),
        id_ph
    );
    q
}

/// DELETE where one column matches.
pub fn delete_where(schema: &str, entity: &EntityDef, column: &str, value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table);
    let ph = q.push_param(value.clone(), column_kind(entity, column));
    q.sql = format!("DELETE FROM {} WHERE {} = {}", table, quoted(column), ph);
    q
}

/// Call of the backend-side average cost function.
pub fn ingredient_average_cost(schema: &str, raw_material_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(Value::from(raw_material_id), ColumnKind::BigInt);
    q.sql = format!(
        "SELECT {}.{}({})::float8",
        quoted(schema),
        quoted("get_ingredient_average_cost"),
        ph
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{EmbedSelect, SearchSelect};
    use crate::catalog::{entities, OrderSpec};
    use serde_json::json;

    #[test]
    fn select_embeds_units_as_row_to_json() {
        let raw = entities::raw_material();
        let units = entities::unit_of_measure();
        let query = SelectQuery {
            filters: vec![],
            embeds: vec![EmbedSelect {
                name: "units_of_measure",
                related: &units,
                our_key: "unit_id",
                their_key: "id",
                columns: &["name", "abbreviation"],
            }],
            search: None,
            order: raw.default_order.clone(),
            limit: None,
            offset: None,
        };
        let q = select("public", &raw, &query);
        assert_eq!(
            q.sql,
            "SELECT main.\"id\" AS \"id\", main.\"name\" AS \"name\", main.\"unit_id\" AS \"unit_id\", \
             main.\"created_at\" AS \"created_at\", \
             (SELECT row_to_json(sub) FROM (SELECT \"name\", \"abbreviation\" FROM \"public\".\"units_of_measure\" \
             WHERE \"id\" = main.\"unit_id\") sub) AS \"units_of_measure\" \
             FROM \"public\".\"raw_materials\" main \
             ORDER BY main.\"created_at\" DESC NULLS LAST, main.\"id\" DESC LIMIT 100"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn select_filters_cast_to_column_type() {
        let recipe = entities::recipe();
        let mut query = SelectQuery::by_column(&recipe, "product_id", json!(3));
        query.filters.push(("not_a_column".into(), json!("x")));
        query.order = OrderSpec::asc("id");
        query.limit = Some(5000);
        query.offset = Some(10);
        let q = select("bakery", &recipe, &query);
        assert!(q.sql.contains("WHERE main.\"product_id\" = $1::int8"));
        assert!(q.sql.contains("main.\"required_quantity\"::float8 AS \"required_quantity\""));
        assert!(q.sql.ends_with("ORDER BY main.\"id\" ASC LIMIT 1000 OFFSET 10"));
        assert_eq!(q.params, vec![json!(3)]);
    }

    #[test]
    fn select_search_escapes_like_metacharacters() {
        let product = entities::product();
        let query = SelectQuery {
            search: Some(SearchSelect {
                term: "50%_off".into(),
                targets: vec![SearchTarget::Own("name")],
            }),
            ..SelectQuery::by_column(&product, "name", Value::Null)
        };
        let q = select("public", &product, &query);
        assert!(q.sql.contains("main.\"name\" IS NULL AND (main.\"name\"::text ILIKE $1::text)"));
        assert_eq!(q.params, vec![json!("%50\\%\\_off%")]);
    }

    #[test]
    fn insert_only_lists_supplied_columns() {
        let product = entities::product();
        let mut row = Row::new();
        row.insert("name".into(), json!("Pan"));
        let q = insert("public", &product, &row);
        assert_eq!(
            q.sql,
            "INSERT INTO \"public\".\"products\" (\"name\") VALUES ($1::text) \
             RETURNING \"id\", \"name\", \"description\", \"created_at\""
        );
    }

    #[test]
    fn update_puts_key_last() {
        let recipe = entities::recipe();
        let mut patch = Row::new();
        patch.insert("unit_id".into(), json!(2));
        patch.insert("required_quantity".into(), json!(1.5));
        let q = update("public", &recipe, &json!(9), &patch);
        assert_eq!(
            q.sql,
            "UPDATE \"public\".\"recipes\" SET \"required_quantity\" = $1::numeric, \"unit_id\" = $2::int8 \
             WHERE \"id\" = $3::int8"
        );
        assert_eq!(q.params, vec![json!(1.5), json!(2), json!(9)]);
    }

    #[test]
    fn user_table_is_quoted() {
        let user = entities::user();
        let q = delete_where("public", &user, "user_id", &json!("0b6f1c1e-3f55-4b8e-9a51-0c1c2d3e4f50"));
        assert_eq!(q.sql, "DELETE FROM \"public\".\"user\" WHERE \"user_id\" = $1::uuid");
    }
}
