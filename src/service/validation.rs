//! Request validation from catalog column rules.

use crate::backend::Row;
use crate::catalog::{Catalog, ColumnKind, EntityDef, ValidationRule};
use crate::error::AppError;
use regex::Regex;
use serde_json::Value;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body. Every field must be a known writable column and all required
    /// columns must be present and non-empty.
    pub fn validate(body: &Row, entity: &EntityDef) -> Result<(), AppError> {
        check_fields(body, entity)?;
        for col in entity.columns.iter().filter(|c| c.required) {
            if is_blank(body.get(col.name)) {
                return Err(AppError::Validation(format!("{} is required", col.name)));
            }
        }
        Ok(())
    }

    /// Validate a create body that may name references by natural key (`user_name` for
    /// `user_id`). Runs before any lookup: a natural key stands in for its reference column in
    /// the required check and must fit the column it is looked up by.
    pub fn validate_create(body: &Row, entity: &EntityDef, catalog: &Catalog) -> Result<(), AppError> {
        let mut direct = body.clone();
        let mut by_key = Vec::new();
        for nk in &entity.natural_keys {
            let Some(value) = direct.remove(nk.input) else { continue };
            if direct.contains_key(nk.column) {
                return Err(AppError::Validation(format!(
                    "give either {} or {}, not both",
                    nk.input, nk.column
                )));
            }
            if is_blank(Some(&value)) {
                return Err(AppError::Validation(format!("{} is required", nk.input)));
            }
            if let Some(col) = catalog.entity(nk.target).column(nk.target_column) {
                validate_kind(nk.input, col.kind, &value)?;
                validate_field(nk.input, &value, &col.rule)?;
            }
            by_key.push(nk.column);
        }
        check_fields(&direct, entity)?;
        for col in entity.columns.iter().filter(|c| c.required && !by_key.contains(&c.name)) {
            if is_blank(direct.get(col.name)) {
                return Err(AppError::Validation(format!("{} is required", col.name)));
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PATCH). Required columns may be left out
    /// but not cleared; the primary key cannot change.
    pub fn validate_partial(body: &Row, entity: &EntityDef) -> Result<(), AppError> {
        if body.contains_key(entity.pk) {
            return Err(AppError::Validation(format!("{} cannot be changed", entity.pk)));
        }
        check_fields(body, entity)?;
        for col in entity.columns.iter().filter(|c| c.required) {
            if body.contains_key(col.name) && is_blank(body.get(col.name)) {
                return Err(AppError::Validation(format!("{} cannot be cleared", col.name)));
            }
        }
        Ok(())
    }

    /// Canonical form for values compared by the backend (UUIDs lowercase hyphenated).
    pub fn normalize(body: &mut Row, entity: &EntityDef) {
        for col in entity.columns.iter().filter(|c| c.kind == ColumnKind::Uuid) {
            if let Some(Value::String(s)) = body.get_mut(col.name) {
                if let Ok(u) = uuid::Uuid::parse_str(s) {
                    *s = u.to_string();
                }
            }
        }
    }
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn check_fields(body: &Row, entity: &EntityDef) -> Result<(), AppError> {
    let mut unknown: Vec<&str> = body
        .keys()
        .filter(|k| entity.column(k).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(AppError::Validation(format!(
            "unknown field(s) for {}: {}",
            entity.kind,
            unknown.join(", ")
        )));
    }
    for col in &entity.columns {
        let Some(v) = body.get(col.name) else { continue };
        if !col.writable {
            return Err(AppError::Validation(format!("{} is read-only", col.name)));
        }
        validate_kind(col.name, col.kind, v)?;
        validate_field(col.name, v, &col.rule)?;
    }
    Ok(())
}

fn validate_kind(name: &str, kind: ColumnKind, v: &Value) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    let ok = match kind {
        ColumnKind::Text => v.is_string(),
        ColumnKind::BigInt | ColumnKind::BigSerial => v.as_i64().is_some(),
        ColumnKind::Numeric => v.is_number(),
        ColumnKind::Date => v
            .as_str()
            .map(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            .unwrap_or(false),
        ColumnKind::Timestamptz => v
            .as_str()
            .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
            .unwrap_or(false),
        ColumnKind::Uuid => v
            .as_str()
            .map(|s| uuid::Uuid::parse_str(s).is_ok())
            .unwrap_or(false),
    };
    if ok {
        Ok(())
    } else {
        let expected = match kind {
            ColumnKind::Text => "a string",
            ColumnKind::BigInt | ColumnKind::BigSerial => "an integer",
            ColumnKind::Numeric => "a number",
            ColumnKind::Date => "a date (YYYY-MM-DD)",
            ColumnKind::Timestamptz => "an RFC 3339 timestamp",
            ColumnKind::Uuid => "a valid UUID",
        };
        Err(AppError::Validation(format!("{} must be {}", name, expected)))
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                let (local, domain) = s.split_once('@').unwrap_or(("", ""));
                if local.is_empty() || domain.is_empty() || domain.contains('@') {
                    return Err(AppError::Validation(format!("{} must be a valid email", col)));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entities;
    use serde_json::json;

    fn body(v: Value) -> Row {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    fn message(err: AppError) -> String {
        match err {
            AppError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn product_requires_name() {
        let product = entities::product();
        let err = RequestValidator::validate(&body(json!({})), &product).unwrap_err();
        assert_eq!(message(err), "name is required");
        let err = RequestValidator::validate(&body(json!({"name": "  "})), &product).unwrap_err();
        assert_eq!(message(err), "name is required");
        RequestValidator::validate(&body(json!({"name": "Pan de queso"})), &product).unwrap();
    }

    #[test]
    fn recipe_requires_all_four_fields() {
        let recipe = entities::recipe();
        let err = RequestValidator::validate(
            &body(json!({"product_id": 1, "raw_material_id": 2, "unit_id": 3})),
            &recipe,
        )
        .unwrap_err();
        assert_eq!(message(err), "required_quantity is required");
    }

    #[test]
    fn quantities_must_be_non_negative_numbers() {
        let sale = entities::sale();
        let base = json!({"product_id": 1, "quantity_sold": -1, "unit_sale_price": 2.5, "sale_date": "2024-05-01"});
        let err = RequestValidator::validate(&body(base), &sale).unwrap_err();
        assert_eq!(message(err), "quantity_sold must be at least 0");
        let err = RequestValidator::validate(
            &body(json!({"product_id": 1, "quantity_sold": "3", "unit_sale_price": 2.5, "sale_date": "2024-05-01"})),
            &sale,
        )
        .unwrap_err();
        assert_eq!(message(err), "quantity_sold must be a number");
    }

    #[test]
    fn dates_must_be_calendar_dates() {
        let purchase = entities::purchase();
        let err = RequestValidator::validate(
            &body(json!({"raw_material_id": 1, "quantity": 5, "total_cost": 10, "purchase_date": "2024-02-30"})),
            &purchase,
        )
        .unwrap_err();
        assert_eq!(message(err), "purchase_date must be a date (YYYY-MM-DD)");
    }

    #[test]
    fn rejects_password_and_read_only_fields() {
        let user = entities::user();
        let err = RequestValidator::validate(
            &body(json!({"user_name": "ana", "user_email": "ana@panaderia.test", "user_password": "secret"})),
            &user,
        )
        .unwrap_err();
        assert_eq!(message(err), "unknown field(s) for users: user_password");
        let err = RequestValidator::validate(
            &body(json!({"user_name": "ana", "user_email": "ana@panaderia.test", "user_state": "active"})),
            &user,
        )
        .unwrap_err();
        assert_eq!(message(err), "user_state is read-only");
        let err = RequestValidator::validate(
            &body(json!({"user_name": "ana", "user_email": "ana.panaderia.test"})),
            &user,
        )
        .unwrap_err();
        assert_eq!(message(err), "user_email must be a valid email");
    }

    #[test]
    fn partial_allows_missing_required_but_not_clearing() {
        let raw = entities::raw_material();
        RequestValidator::validate_partial(&body(json!({"name": "Harina 000"})), &raw).unwrap();
        let err = RequestValidator::validate_partial(&body(json!({"unit_id": null})), &raw).unwrap_err();
        assert_eq!(message(err), "unit_id cannot be cleared");
        let err = RequestValidator::validate_partial(&body(json!({"id": 4})), &raw).unwrap_err();
        assert_eq!(message(err), "id cannot be changed");
    }

    #[test]
    fn natural_keys_are_checked_before_lookup() {
        let catalog = Catalog::bakery().unwrap();
        let user_role = catalog.entity(crate::catalog::EntityKind::UserRole);
        let validate = |v: Value| RequestValidator::validate_create(&body(v), user_role, &catalog);

        validate(json!({"user_name": "ana", "rol_idext": "R-1"})).unwrap();
        validate(json!({"user_id": "6a1f0a52-5f8e-4a55-9d35-8f4b8d1e2c3a", "rol_idext": "R-1"})).unwrap();
        assert_eq!(message(validate(json!({"user_name": "nadie"})).unwrap_err()), "rol_id is required");
        assert_eq!(
            message(validate(json!({"user_name": 5, "rol_idext": "R-1"})).unwrap_err()),
            "user_name must be a string"
        );
        assert_eq!(
            message(validate(json!({"user_name": " ", "rol_id": 1})).unwrap_err()),
            "user_name is required"
        );
        assert_eq!(
            message(validate(json!({"user_name": "ana", "user_id": "6a1f0a52-5f8e-4a55-9d35-8f4b8d1e2c3a", "rol_id": 1})).unwrap_err()),
            "give either user_name or user_id, not both"
        );
    }

    #[test]
    fn normalize_lowercases_uuids() {
        let user_role = entities::user_role();
        let mut b = body(json!({"user_id": "6A1F0A52-5F8E-4A55-9D35-8F4B8D1E2C3A", "rol_id": 1}));
        RequestValidator::normalize(&mut b, &user_role);
        assert_eq!(b["user_id"], json!("6a1f0a52-5f8e-4a55-9d35-8f4b8d1e2c3a"));
    }
}
