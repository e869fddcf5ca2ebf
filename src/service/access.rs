//! The data-access contract: list, get, create, update, delete per entity.

use crate::backend::{EmbedSelect, Row, SearchSelect, SearchTarget, SelectQuery, TableBackend};
use crate::catalog::{Catalog, EmbedDef, EntityDef, EntityKind, Generated, OnDelete, SearchField};
use crate::error::{AppError, ConfigError};
use crate::model::Record;
use crate::service::{EmbedSelection, ListQuery, Patch, RequestValidator};
use crate::session::Session;
use serde_json::Value;
use std::sync::Arc;

/// Data access on behalf of one session.
#[derive(Clone)]
pub struct DataAccess {
    backend: Arc<dyn TableBackend>,
    catalog: Arc<Catalog>,
    session: Session,
}

impl DataAccess {
    pub fn new(backend: Arc<dyn TableBackend>, catalog: Arc<Catalog>, session: Session) -> Self {
        DataAccess {
            backend,
            catalog,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        self.session.ensure_active()?;
        let entity = self.catalog.entity(kind);
        let order = query.order.clone().unwrap_or_else(|| entity.default_order.clone());
        if entity.column(&order.column).is_none() {
            return Err(AppError::BadRequest(format!("unknown order column: {}", order.column)));
        }
        let select = SelectQuery {
            filters: query.filters.clone(),
            embeds: self.embeds(entity, &query.embed)?,
            search: query.search.as_deref().map(|t| self.search(entity, t)),
            order,
            limit: query.limit,
            offset: query.offset,
        };
        self.backend.select(entity, &select).await
    }

    pub async fn list_as<R: Record>(&self, query: &ListQuery) -> Result<Vec<R>, AppError> {
        self.list(R::KIND, query)
            .await?
            .into_iter()
            .map(|row| decode::<R>(row))
            .collect()
    }

    /// One row by primary key, default embeds attached.
    pub async fn get(&self, kind: EntityKind, id: &Value) -> Result<Value, AppError> {
        self.session.ensure_active()?;
        let entity = self.catalog.entity(kind);
        let mut select = SelectQuery::by_column(entity, entity.pk, id.clone()).with_limit(1);
        select.embeds = self.embeds(entity, &EmbedSelection::Default)?;
        self.backend
            .select(entity, &select)
            .await?
            .pop()
            .ok_or_else(|| not_found(entity, id))
    }

    pub async fn get_as<R: Record>(&self, id: &Value) -> Result<R, AppError> {
        decode(self.get(R::KIND, id).await?)
    }

    /// Validate (natural keys included), resolve natural keys, fill generated values, check references and uniqueness,
    /// insert, and return the stored row with its default embeds.
    pub async fn create(&self, kind: EntityKind, mut fields: Row) -> Result<Value, AppError> {
        self.session.ensure_active()?;
        let entity = self.catalog.entity(kind);
        RequestValidator::validate_create(&fields, entity, &self.catalog)?;
        self.resolve_natural_keys(entity, &mut fields).await?;
        RequestValidator::validate(&fields, entity)?;
        RequestValidator::normalize(&mut fields, entity);
        for col in &entity.columns {
            if col.generated == Some(Generated::UuidIfAbsent)
                && fields.get(col.name).map(Value::is_null).unwrap_or(true)
            {
                fields.insert(col.name.to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
            }
        }
        self.check_references(entity, &fields).await?;
        self.check_unique(entity, &fields, None).await?;
        let stored = self.backend.insert(entity, &fields).await?;
        let key = stored
            .get(entity.pk)
            .cloned()
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))?;
        tracing::info!(user = %self.session.user_id, entity = %kind, id = %key, "created");
        self.get(kind, &key).await
    }

    pub async fn create_as<R: Record>(&self, fields: Row) -> Result<R, AppError> {
        decode(self.create(R::KIND, fields).await?)
    }

    /// Apply a validated patch. Nothing is returned; callers merge the patch themselves.
    pub async fn update(&self, kind: EntityKind, id: &Value, patch: &Patch) -> Result<(), AppError> {
        self.session.ensure_active()?;
        let entity = self.catalog.entity(kind);
        if patch.entity() != kind {
            return Err(AppError::BadRequest(format!(
                "patch for {} applied to {}",
                patch.entity(),
                kind
            )));
        }
        self.require_row(entity, id).await?;
        self.check_references(entity, patch.fields()).await?;
        self.check_unique(entity, patch.fields(), Some(id)).await?;
        let affected = self.backend.update(entity, id, patch.fields()).await?;
        if affected == 0 {
            return Err(not_found(entity, id));
        }
        tracing::info!(user = %self.session.user_id, entity = %kind, id = %id, "updated");
        Ok(())
    }

    /// Delete by primary key. Restricted references block the delete; cascading ones are
    /// removed first.
    pub async fn delete(&self, kind: EntityKind, id: &Value) -> Result<(), AppError> {
        self.session.ensure_active()?;
        let entity = self.catalog.entity(kind);
        let row = self.require_row(entity, id).await?;
        let referencing = self.catalog.referencing(kind);
        let mut cascades = Vec::new();
        for (child, reference) in referencing {
            let Some(value) = row.get(reference.target_column).filter(|v| !v.is_null()) else {
                continue;
            };
            match reference.on_delete {
                OnDelete::Restrict => {
                    let probe = SelectQuery::by_column(child, reference.column, value.clone()).with_limit(1);
                    if !self.backend.select(child, &probe).await?.is_empty() {
                        return Err(AppError::Constraint(format!(
                            "{} {} is still referenced by {}",
                            entity.table, id, child.table
                        )));
                    }
                }
                OnDelete::Cascade => cascades.push((child, reference.column, value.clone())),
            }
        }
        for (child, column, value) in cascades {
            let removed = self.backend.delete_where(child, column, &value).await?;
            if removed > 0 {
                tracing::info!(user = %self.session.user_id, entity = %child.kind, removed, "cascaded delete");
            }
        }
        let affected = self.backend.delete_where(entity, entity.pk, id).await?;
        if affected == 0 {
            return Err(not_found(entity, id));
        }
        tracing::info!(user = %self.session.user_id, entity = %kind, id = %id, "deleted");
        Ok(())
    }

    /// Weighted-average unit cost from purchases, computed by the backend.
    pub async fn ingredient_average_cost(&self, raw_material_id: i64) -> Result<Option<f64>, AppError> {
        self.session.ensure_active()?;
        let entity = self.catalog.entity(EntityKind::RawMaterial);
        self.require_row(entity, &Value::from(raw_material_id)).await?;
        self.backend.ingredient_average_cost(raw_material_id).await
    }

    async fn require_row(&self, entity: &EntityDef, id: &Value) -> Result<Value, AppError> {
        let probe = SelectQuery::by_column(entity, entity.pk, id.clone()).with_limit(1);
        self.backend
            .select(entity, &probe)
            .await?
            .pop()
            .ok_or_else(|| not_found(entity, id))
    }

    async fn resolve_natural_keys(&self, entity: &EntityDef, fields: &mut Row) -> Result<(), AppError> {
        for nk in &entity.natural_keys {
            let Some(value) = fields.remove(nk.input) else { continue };
            let target = self.catalog.entity(nk.target);
            let target_pk = entity
                .reference(nk.column)
                .map(|r| r.target_column)
                .unwrap_or(target.pk);
            let probe = SelectQuery::by_column(target, nk.target_column, value.clone()).with_limit(1);
            let key = self
                .backend
                .select(target, &probe)
                .await?
                .pop()
                .and_then(|row| row.get(target_pk).cloned())
                .ok_or_else(|| {
                    AppError::Constraint(format!(
                        "{} {} = {} does not exist",
                        target.table, nk.target_column, value
                    ))
                })?;
            fields.insert(nk.column.to_string(), key);
        }
        Ok(())
    }

    async fn check_references(&self, entity: &EntityDef, fields: &Row) -> Result<(), AppError> {
        for reference in &entity.references {
            let Some(value) = fields.get(reference.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let target = self.catalog.entity(reference.target);
            let probe = SelectQuery::by_column(target, reference.target_column, value.clone()).with_limit(1);
            if self.backend.select(target, &probe).await?.is_empty() {
                return Err(AppError::Constraint(format!(
                    "{} {} = {} does not exist",
                    target.table, reference.target_column, value
                )));
            }
        }
        Ok(())
    }

    /// Unique columns (and a supplied primary key) must not collide with another row.
    async fn check_unique(&self, entity: &EntityDef, fields: &Row, own_key: Option<&Value>) -> Result<(), AppError> {
        for col in entity.columns.iter().filter(|c| c.unique || c.name == entity.pk) {
            let Some(value) = fields.get(col.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let probe = SelectQuery::by_column(entity, col.name, value.clone()).with_limit(2);
            let clash = self.backend.select(entity, &probe).await?.iter().any(|row| match own_key {
                Some(key) => row.get(entity.pk).map(|k| !same_key(k, key)).unwrap_or(true),
                None => true,
            });
            if clash {
                return Err(AppError::Constraint(format!(
                    "{}.{} {} already exists",
                    entity.table, col.name, value
                )));
            }
        }
        Ok(())
    }

    fn embeds<'a>(&'a self, entity: &'a EntityDef, selection: &EmbedSelection) -> Result<Vec<EmbedSelect<'a>>, AppError> {
        match selection {
            EmbedSelection::None => Ok(Vec::new()),
            EmbedSelection::Default => entity.embeds.iter().map(|e| self.embed(entity, e)).collect(),
            EmbedSelection::Only(names) => names
                .iter()
                .map(|name| {
                    let def = entity
                        .embed(name)
                        .ok_or_else(|| AppError::BadRequest(format!("unknown embed for {}: {}", entity.kind, name)))?;
                    self.embed(entity, def)
                })
                .collect(),
        }
    }

    fn embed<'a>(&'a self, entity: &'a EntityDef, def: &'a EmbedDef) -> Result<EmbedSelect<'a>, AppError> {
        let reference = entity.reference(def.via).ok_or_else(|| {
            AppError::Config(ConfigError::Validation(format!(
                "embed {} of {} has no reference",
                def.name, entity.table
            )))
        })?;
        Ok(EmbedSelect {
            name: def.name,
            related: self.catalog.entity(reference.target),
            our_key: def.via,
            their_key: reference.target_column,
            columns: def.columns,
        })
    }

    fn search<'a>(&'a self, entity: &'a EntityDef, term: &str) -> SearchSelect<'a> {
        let targets = entity
            .search
            .iter()
            .filter_map(|field| match field {
                SearchField::Own(col) => Some(SearchTarget::Own(*col)),
                SearchField::Embedded { embed, column } => {
                    let def = entity.embed(embed)?;
                    let reference = entity.reference(def.via)?;
                    Some(SearchTarget::Related {
                        related: self.catalog.entity(reference.target),
                        our_key: def.via,
                        their_key: reference.target_column,
                        column: *column,
                    })
                }
            })
            .collect();
        SearchSelect {
            term: term.to_string(),
            targets,
        }
    }
}

fn not_found(entity: &EntityDef, id: &Value) -> AppError {
    AppError::NotFound(format!("{} {}", entity.table, id))
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn decode<R: Record>(row: Value) -> Result<R, AppError> {
    serde_json::from_value(row).map_err(|e| AppError::Internal(format!("cannot decode {} row: {}", R::KIND, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn session() -> Session {
        Session::new("tester", None, Utc::now() + Duration::hours(1))
    }

    fn access() -> DataAccess {
        let catalog = Arc::new(Catalog::bakery().unwrap());
        DataAccess::new(Arc::new(MemoryBackend::new()), catalog, session())
    }

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    #[tokio::test]
    async fn expired_session_blocks_every_operation() {
        let catalog = Arc::new(Catalog::bakery().unwrap());
        let expired = Session::new("tester", None, Utc::now() - Duration::seconds(1));
        let data = DataAccess::new(Arc::new(MemoryBackend::new()), catalog, expired);
        let err = data.list(EntityKind::Product, &ListQuery::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        let err = data.create(EntityKind::Product, row(json!({"name": "Pan"}))).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn create_checks_references() {
        let data = access();
        let err = data
            .create(EntityKind::RawMaterial, row(json!({"name": "Harina", "unit_id": 41})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Constraint(_)));
        assert!(data.list(EntityKind::RawMaterial, &ListQuery::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_generates_uuid_keys() {
        let data = access();
        let user = data
            .create(EntityKind::User, row(json!({"user_name": "ana", "user_email": "ana@panaderia.test"})))
            .await
            .unwrap();
        let id = user["user_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        let role = data.create(EntityKind::Role, row(json!({"rol_name": "Panadero"}))).await.unwrap();
        assert!(role["rol_id"].is_i64());
        assert!(role["rol_id_ext"].is_string());
    }

    #[tokio::test]
    async fn duplicate_user_name_is_a_constraint_error() {
        let data = access();
        data.create(EntityKind::User, row(json!({"user_name": "ana", "user_email": "a@b.c"})))
            .await
            .unwrap();
        let err = data
            .create(EntityKind::User, row(json!({"user_name": "ana", "user_email": "x@y.z"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Constraint(_)));
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let data = access();
        let product = crate::catalog::entities::product();
        let patch = Patch::new(&product, row(json!({"name": "Baguette"}))).unwrap();
        let err = data.update(EntityKind::Product, &json!(404), &patch).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_rejects_patch_of_other_entity() {
        let data = access();
        let p = data.create(EntityKind::Product, row(json!({"name": "Pan"}))).await.unwrap();
        let unit = crate::catalog::entities::unit_of_measure();
        let patch = Patch::new(&unit, row(json!({"name": "Litro"}))).unwrap();
        let err = data.update(EntityKind::Product, &p["id"], &patch).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn user_role_natural_keys_resolve_to_ids() {
        let data = access();
        let user = data
            .create(EntityKind::User, row(json!({"user_name": "ana", "user_email": "ana@panaderia.test"})))
            .await
            .unwrap();
        let role = data
            .create(EntityKind::Role, row(json!({"rol_name": "Admin", "rol_id_ext": "R-1"})))
            .await
            .unwrap();
        let link = data
            .create(EntityKind::UserRole, row(json!({"user_name": "ana", "rol_idext": "R-1"})))
            .await
            .unwrap();
        assert_eq!(link["user_id"], user["user_id"]);
        assert_eq!(link["rol_id"], role["rol_id"]);
        assert_eq!(link["user"], json!({"user_name": "ana"}));
        assert_eq!(link["rol"], json!({"rol_name": "Admin", "rol_id_ext": "R-1"}));

        let err = data
            .create(EntityKind::UserRole, row(json!({"user_name": "luis", "rol_idext": "R-1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Constraint(_)));
    }

    #[tokio::test]
    async fn malformed_natural_keys_fail_validation_not_lookup() {
        let data = access();
        data.create(EntityKind::Role, row(json!({"rol_name": "Admin", "rol_id_ext": "R-1"})))
            .await
            .unwrap();
        let err = data
            .create(EntityKind::UserRole, row(json!({"user_name": "nadie"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = data
            .create(EntityKind::UserRole, row(json!({"user_name": 5, "rol_idext": "R-1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn undecodable_rows_are_internal_errors() {
        let err = decode::<crate::model::Product>(json!({"id": "seven"})).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn unknown_embed_is_bad_request() {
        let data = access();
        let query = ListQuery {
            embed: EmbedSelection::Only(vec!["suppliers".into()]),
            ..ListQuery::default()
        };
        let err = data.list(EntityKind::Recipe, &query).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn average_cost_requires_existing_raw_material() {
        let data = access();
        let err = data.ingredient_average_cost(12).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
