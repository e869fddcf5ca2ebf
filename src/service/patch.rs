use crate::backend::Row;
use crate::catalog::{EntityDef, EntityKind};
use crate::error::AppError;
use crate::service::RequestValidator;
use serde_json::{Map, Value};

/// A validated partial update: a non-empty set of known, writable, non-key columns of one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    entity: EntityKind,
    fields: Row,
}

impl Patch {
    pub fn new(entity: &EntityDef, mut fields: Row) -> Result<Self, AppError> {
        if fields.is_empty() {
            return Err(AppError::Validation("patch has no fields".into()));
        }
        RequestValidator::validate_partial(&fields, entity)?;
        RequestValidator::normalize(&mut fields, entity);
        Ok(Patch {
            entity: entity.kind,
            fields,
        })
    }

    /// Build from a JSON body; anything but an object is a bad request.
    pub fn from_value(entity: &EntityDef, body: Value) -> Result<Self, AppError> {
        match body {
            Value::Object(map) => Self::new(entity, map.into_iter().collect()),
            _ => Err(AppError::BadRequest("body must be a JSON object".into())),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    /// Merge into a row of the same entity. Returns false (row untouched) when `row` is not an
    /// object or `entity` is not the patch's entity.
    pub fn apply_to(&self, entity: &EntityDef, row: &mut Value) -> bool {
        if entity.kind != self.entity {
            return false;
        }
        match row {
            Value::Object(map) => {
                merge_fields(entity, map, &self.fields);
                true
            }
            _ => false,
        }
    }
}

/// Copy `fields` into `target`, skipping the primary key and columns the entity does not have.
/// Embedded objects already on `target` are left as they are.
pub fn merge_fields(entity: &EntityDef, target: &mut Map<String, Value>, fields: &Row) {
    for col in &entity.columns {
        if col.name == entity.pk {
            continue;
        }
        if let Some(v) = fields.get(col.name) {
            target.insert(col.name.to_string(), v.clone());
        }
    }
}
