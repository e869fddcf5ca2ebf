//! Catalog: validated entity descriptors, looked up by kind or route segment.

use crate::catalog::entities::definition;
use crate::catalog::types::{EntityDef, EntityKind, ReferenceDef};
use crate::catalog::validate;
use crate::error::ConfigError;

/// Holds exactly one descriptor per [`EntityKind`], in declaration order.
#[derive(Clone, Debug)]
pub struct Catalog {
    entities: Vec<EntityDef>,
    slots: [usize; EntityKind::ALL.len()],
}

impl Catalog {
    /// Build and validate the bakery catalog.
    pub fn bakery() -> Result<Self, ConfigError> {
        Self::from_entities(EntityKind::ALL.iter().map(|k| definition(*k)).collect())
    }

    /// Fails unless every kind is described exactly once and all descriptors agree.
    pub fn from_entities(entities: Vec<EntityDef>) -> Result<Self, ConfigError> {
        validate(&entities)?;
        let mut slots = [0; EntityKind::ALL.len()];
        for (i, e) in entities.iter().enumerate() {
            slots[e.kind as usize] = i;
        }
        Ok(Catalog { entities, slots })
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    pub fn entity(&self, kind: EntityKind) -> &EntityDef {
        &self.entities[self.slots[kind as usize]]
    }

    pub fn entity_by_path(&self, path: &str) -> Option<&EntityDef> {
        EntityKind::from_path_segment(path).map(|kind| self.entity(kind))
    }

    /// Every (entity, reference) pair pointing at `target`.
    pub fn referencing(&self, target: EntityKind) -> Vec<(&EntityDef, &ReferenceDef)> {
        self.entities
            .iter()
            .flat_map(|e| e.references.iter().map(move |r| (e, r)))
            .filter(|(_, r)| r.target == target)
            .collect()
    }
}
