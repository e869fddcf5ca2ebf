//! Catalog validation: referential integrity between descriptors and route consistency.

use crate::catalog::{EntityDef, EntityKind, OnDelete, SearchField};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(entities: &[EntityDef]) -> Result<(), ConfigError> {
    let by_kind: HashMap<EntityKind, &EntityDef> = entities.iter().map(|e| (e.kind, e)).collect();
    let mut path_segments = HashSet::new();
    let mut tables = HashSet::new();

    for e in entities {
        if !path_segments.insert(e.kind.path_segment()) {
            return Err(ConfigError::DuplicatePathSegment(e.kind.path_segment().to_string()));
        }
        if !tables.insert(e.table) {
            return Err(ConfigError::Validation(format!("table {} declared twice", e.table)));
        }
        if e.column(e.pk).is_none() {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: e.table.to_string(),
                column: e.pk.to_string(),
            });
        }
        for col in [e.created_column, e.default_order.column.as_str()] {
            if e.column(col).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.table, col),
                });
            }
        }

        for r in &e.references {
            if e.column(r.column).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.table, r.column),
                });
            }
            let target = by_kind.get(&r.target).ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: r.target.to_string(),
            })?;
            let target_col = target.column(r.target_column).ok_or_else(|| ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", target.table, r.target_column),
            })?;
            if target.pk != r.target_column && !target_col.unique {
                return Err(ConfigError::Validation(format!(
                    "{}.{} references {}.{} which is neither primary key nor unique",
                    e.table, r.column, target.table, r.target_column
                )));
            }
        }

        for emb in &e.embeds {
            let r = e.reference(emb.via).ok_or_else(|| ConfigError::MissingReference {
                kind: "reference",
                id: format!("{}.{}", e.table, emb.via),
            })?;
            let target = by_kind.get(&r.target).ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: r.target.to_string(),
            })?;
            for col in emb.columns {
                if target.column(col).is_none() {
                    return Err(ConfigError::MissingReference {
                        kind: "embed column",
                        id: format!("{}.{}", target.table, col),
                    });
                }
            }
        }

        for nk in &e.natural_keys {
            let target = by_kind.get(&nk.target).ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: nk.target.to_string(),
            })?;
            let unique = target.column(nk.target_column).map(|c| c.unique).unwrap_or(false);
            if !unique || e.reference(nk.column).is_none() {
                return Err(ConfigError::Validation(format!(
                    "natural key {} on {} must resolve a unique column into a reference",
                    nk.input, e.table
                )));
            }
        }

        for field in &e.search {
            let ok = match field {
                SearchField::Own(col) => e.column(col).is_some(),
                SearchField::Embedded { embed, column } => e
                    .embed(embed)
                    .map(|emb| emb.columns.contains(column))
                    .unwrap_or(false),
            };
            if !ok {
                return Err(ConfigError::MissingReference {
                    kind: "search field",
                    id: format!("{}: {:?}", e.table, field),
                });
            }
        }
    }

    // Cascaded deletes go one level deep: a cascading child must itself be unreferenced.
    for e in entities {
        for r in e.references.iter().filter(|r| r.on_delete == OnDelete::Cascade) {
            if entities.iter().any(|other| other.references.iter().any(|o| o.target == e.kind)) {
                return Err(ConfigError::Validation(format!(
                    "{} cascades from {} but is itself referenced",
                    e.table, r.target
                )));
            }
        }
    }

    for kind in EntityKind::ALL {
        if !by_kind.contains_key(&kind) {
            return Err(ConfigError::MissingReference {
                kind: "entity",
                id: kind.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entities;

    #[test]
    fn rejects_embed_of_unknown_column() {
        let mut recipe = entities::recipe();
        recipe.embeds[0].columns = &["price"];
        let err = validate(&[entities::product(), entities::raw_material(), entities::unit_of_measure(), recipe])
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "embed column", .. }));
    }

    #[test]
    fn rejects_reference_to_missing_entity() {
        let err = validate(&[entities::recipe()]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "entity", .. }));
    }

    #[test]
    fn rejects_nested_cascade() {
        let mut recipe = entities::recipe();
        recipe.references[1].on_delete = OnDelete::Cascade;
        let mut purchase = entities::purchase();
        purchase.references[0].target = EntityKind::Recipe;
        purchase.embeds.clear();
        purchase.search.clear();
        let err = validate(&[
            entities::product(),
            entities::unit_of_measure(),
            entities::raw_material(),
            recipe,
            purchase,
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_catalog_without_every_kind() {
        let err = validate(&[entities::product(), entities::unit_of_measure()]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "entity", .. }));
        assert!(validate(&[]).is_err());
    }

    #[test]
    fn rejects_duplicate_route() {
        let err = validate(&[entities::product(), entities::product()]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePathSegment(_)));
    }
}
