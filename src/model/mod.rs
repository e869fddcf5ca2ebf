//! Typed rows as returned by list and get, embeds included.

use crate::catalog::EntityKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row type bound to one entity.
pub trait Record: DeserializeOwned {
    const KIND: EntityKind;
}

/// `{name}` of an embedded product or raw material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NameRef {
    pub name: Option<String>,
}

/// `{name, abbreviation}` of an embedded unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitRef {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
}

impl UnitRef {
    /// "Kilogramo (kg)", or just the name when there is no abbreviation.
    pub fn label(&self) -> String {
        let name = self.name.as_deref().unwrap_or_default();
        match self.abbreviation.as_deref() {
            Some(abbr) if !abbr.is_empty() => format!("{} ({})", name, abbr),
            _ => name.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitOfMeasure {
    pub id: i64,
    pub name: String,
    pub abbreviation: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawMaterial {
    pub id: i64,
    pub name: String,
    pub unit_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub units_of_measure: Option<UnitRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub product_id: i64,
    pub raw_material_id: i64,
    pub required_quantity: f64,
    pub unit_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub products: Option<NameRef>,
    #[serde(default)]
    pub raw_materials: Option<NameRef>,
    #[serde(default)]
    pub units_of_measure: Option<UnitRef>,
}

impl Recipe {
    /// Quantity with its unit, e.g. "2.5 Kilogramo (kg)".
    pub fn quantity_label(&self) -> String {
        match &self.units_of_measure {
            Some(unit) => format!("{} {}", self.required_quantity, unit.label()),
            None => self.required_quantity.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub raw_material_id: i64,
    pub quantity: f64,
    pub total_cost: f64,
    pub purchase_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub raw_materials: Option<NameRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub id: i64,
    pub product_id: i64,
    pub quantity_produced: f64,
    pub production_date: NaiveDate,
    pub unit_production_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub products: Option<NameRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: i64,
    pub product_id: i64,
    pub quantity_sold: f64,
    pub unit_sale_price: f64,
    pub sale_date: NaiveDate,
    pub weighted_average_cost_at_sale: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub products: Option<NameRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub user_state: Option<String>,
    pub user_created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub rol_id: i64,
    pub rol_id_ext: Option<String>,
    pub rol_name: String,
    pub rol_state: Option<String>,
    pub rol_created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub user_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoleRef {
    pub rol_name: Option<String>,
    pub rol_id_ext: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRole {
    pub userrol_id: i64,
    pub user_id: Uuid,
    pub rol_id: i64,
    pub userrol_state: Option<String>,
    pub userrol_created_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub rol: Option<RoleRef>,
}

macro_rules! record {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(impl Record for $ty {
            const KIND: EntityKind = EntityKind::$kind;
        })*
    };
}

record! {
    Product => Product,
    UnitOfMeasure => UnitOfMeasure,
    RawMaterial => RawMaterial,
    Recipe => Recipe,
    Purchase => Purchase,
    Production => Production,
    Sale => Sale,
    User => User,
    Role => Role,
    UserRole => UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recipe_label_uses_unit_name_and_abbreviation() {
        let recipe: Recipe = serde_json::from_value(json!({
            "id": 1,
            "product_id": 2,
            "raw_material_id": 3,
            "required_quantity": 2.5,
            "unit_id": 4,
            "created_at": "2024-05-01T10:00:00.000000Z",
            "products": {"name": "Pan de campo"},
            "raw_materials": {"name": "Harina"},
            "units_of_measure": {"name": "Kilogramo", "abbreviation": "kg"}
        }))
        .unwrap();
        assert_eq!(recipe.quantity_label(), "2.5 Kilogramo (kg)");
        assert_eq!(recipe.raw_materials.and_then(|r| r.name).as_deref(), Some("Harina"));
    }

    #[test]
    fn dangling_embeds_decode_as_none() {
        let recipe: Recipe = serde_json::from_value(json!({
            "id": 1,
            "product_id": 2,
            "raw_material_id": 3,
            "required_quantity": 1.0,
            "unit_id": 4,
            "created_at": "2024-05-01T10:00:00+00:00",
            "products": null,
            "raw_materials": null
        }))
        .unwrap();
        assert!(recipe.raw_materials.is_none());
        assert!(recipe.units_of_measure.is_none());
        assert_eq!(recipe.quantity_label(), "1");
    }

    #[test]
    fn sale_dates_decode() {
        let sale: Sale = serde_json::from_value(json!({
            "id": 9,
            "product_id": 2,
            "quantity_sold": 12.0,
            "unit_sale_price": 1.5,
            "sale_date": "2024-05-03",
            "weighted_average_cost_at_sale": null,
            "created_at": "2024-05-03T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(sale.sale_date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
        assert!(sale.products.is_none());
    }
}
