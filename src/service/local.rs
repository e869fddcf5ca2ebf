use crate::catalog::EntityDef;
use crate::service::Patch;
use serde_json::Value;

/// Rows a list view has loaded, plus the one row being edited (if any).
///
/// Mutators are called only after the backend call succeeded; a failed call leaves the state
/// as it was.
#[derive(Clone, Debug)]
pub struct ListState {
    entity: EntityDef,
    rows: Vec<Value>,
    editing: Option<Value>,
}

impl ListState {
    pub fn new(entity: &EntityDef, rows: Vec<Value>) -> Self {
        ListState {
            entity: entity.clone(),
            rows,
            editing: None,
        }
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn editing(&self) -> Option<&Value> {
        self.editing.as_ref()
    }

    pub fn is_editing(&self, id: &Value) -> bool {
        self.editing.as_ref() == Some(id)
    }

    /// Start editing `id`, replacing any other row in edit. False if `id` is not listed.
    pub fn start_editing(&mut self, id: &Value) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.editing = Some(id.clone());
        true
    }

    pub fn cancel_editing(&mut self) {
        self.editing = None;
    }

    /// Lists are newest first, so a created row goes to the top.
    pub fn created(&mut self, row: Value) {
        self.rows.insert(0, row);
    }

    /// Merge a successful patch into the cached row and leave edit mode for it.
    pub fn updated(&mut self, id: &Value, patch: &Patch) -> bool {
        let Some(pos) = self.position(id) else { return false };
        let applied = patch.apply_to(&self.entity, &mut self.rows[pos]);
        if applied && self.is_editing(id) {
            self.editing = None;
        }
        applied
    }

    pub fn deleted(&mut self, id: &Value) -> bool {
        let Some(pos) = self.position(id) else { return false };
        self.rows.remove(pos);
        if self.is_editing(id) {
            self.editing = None;
        }
        true
    }

    fn position(&self, id: &Value) -> Option<usize> {
        self.rows.iter().position(|r| r.get(self.entity.pk) == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entities;
    use serde_json::json;

    fn state() -> ListState {
        ListState::new(
            &entities::product(),
            vec![
                json!({"id": 2, "name": "Medialuna", "description": null}),
                json!({"id": 1, "name": "Pan", "description": "de campo"}),
            ],
        )
    }

    #[test]
    fn only_one_row_is_edited_at_a_time() {
        let mut s = state();
        assert!(s.start_editing(&json!(1)));
        assert!(s.start_editing(&json!(2)));
        assert!(s.is_editing(&json!(2)));
        assert!(!s.is_editing(&json!(1)));
        assert!(!s.start_editing(&json!(9)));
        assert_eq!(s.editing(), Some(&json!(2)));
        s.cancel_editing();
        assert!(s.editing().is_none());
    }

    #[test]
    fn created_rows_go_first() {
        let mut s = state();
        s.created(json!({"id": 3, "name": "Baguette", "description": null}));
        let ids: Vec<i64> = s.rows().iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn update_merges_patch_and_ends_edit() {
        let product = entities::product();
        let mut s = state();
        s.start_editing(&json!(1));
        let patch = Patch::new(&product, [("name".to_string(), json!("Pan casero"))].into_iter().collect()).unwrap();
        assert!(s.updated(&json!(1), &patch));
        assert_eq!(s.rows()[1], json!({"id": 1, "name": "Pan casero", "description": "de campo"}));
        assert!(s.editing().is_none());
        assert!(!s.updated(&json!(7), &patch));
    }

    #[test]
    fn delete_removes_row() {
        let mut s = state();
        s.start_editing(&json!(2));
        assert!(s.deleted(&json!(2)));
        assert_eq!(s.rows().len(), 1);
        assert!(s.editing().is_none());
        assert!(!s.deleted(&json!(2)));
    }
}
