//! Optimistic list maintenance after successful writes.
//!
//! Applies a server-confirmed create, patch, or remove to a locally held item
//! list without re-fetching. Never touches `total` or the cursor: after a
//! mutation the total is an approximation until the next reset.

use panelgen_core::FieldPath;
use serde_json::Value;

/// Applies write results to an item list, matching records by id.
#[derive(Debug, Clone)]
pub struct OptimisticMutator {
    id_path: FieldPath,
}

impl OptimisticMutator {
    #[must_use]
    pub fn new(id_path: &str) -> Self {
        Self {
            id_path: FieldPath::parse(id_path),
        }
    }

    fn id_of<'v>(&self, record: &'v Value) -> Option<&'v Value> {
        self.id_path.get(record).filter(|id| !id.is_null())
    }

    fn position(&self, items: &[Value], id: &Value) -> Option<usize> {
        items.iter().position(|item| self.id_of(item) == Some(id))
    }

    /// Applies a creation result, a single record or a batch.
    ///
    /// Existing ids are replaced in place; new records go to the front,
    /// keeping the batch's own order.
    pub fn on_created(&self, items: &mut Vec<Value>, created: Value) {
        let records = match created {
            Value::Array(records) => records,
            record => vec![record],
        };
        let mut fresh = Vec::new();
        for record in records {
            match self.id_of(&record).and_then(|id| self.position(items, id)) {
                Some(index) => items[index] = record,
                None => fresh.push(record),
            }
        }
        if !fresh.is_empty() {
            fresh.append(items);
            *items = fresh;
        }
    }

    /// Replaces the matching item in place. Returns `false` if it is not loaded.
    pub fn on_patched(&self, items: &mut [Value], patched: Value) -> bool {
        let Some(index) = self.id_of(&patched).and_then(|id| self.position(items, id)) else {
            return false;
        };
        items[index] = patched;
        true
    }

    /// Removes the item with `id`. Returns `false` if it is not loaded.
    pub fn on_removed(&self, items: &mut Vec<Value>, id: &Value) -> bool {
        match self.position(items, id) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn abc() -> Vec<Value> {
        vec![
            json!({ "id": 1, "name": "A" }),
            json!({ "id": 2, "name": "B" }),
            json!({ "id": 3, "name": "C" }),
        ]
    }

    #[test]
    fn patch_preserves_position() {
        let mutator = OptimisticMutator::new("id");
        let mut items = abc();
        assert!(mutator.on_patched(&mut items, json!({ "id": 2, "name": "B2" })));
        assert_eq!(items[1], json!({ "id": 2, "name": "B2" }));
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["name"], "A");
        assert_eq!(items[2]["name"], "C");
    }

    #[test]
    fn patch_outside_window_is_not_inserted() {
        let mutator = OptimisticMutator::new("id");
        let mut items = abc();
        assert!(!mutator.on_patched(&mut items, json!({ "id": 7, "name": "G" })));
        assert_eq!(items, abc());
    }

    #[test]
    fn create_inserts_at_front() {
        let mutator = OptimisticMutator::new("id");
        let mut items = vec![json!({ "id": 1, "name": "A" }), json!({ "id": 2, "name": "B" })];
        mutator.on_created(&mut items, json!({ "id": 9, "name": "N" }));
        let names: Vec<&str> = items.iter().map(|i| i["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["N", "A", "B"]);
    }

    #[test]
    fn batch_create_replaces_known_and_prepends_new_in_order() {
        let mutator = OptimisticMutator::new("id");
        let mut items = abc();
        mutator.on_created(
            &mut items,
            json!([
                { "id": 8, "name": "X" },
                { "id": 3, "name": "C2" },
                { "id": 9, "name": "Y" }
            ]),
        );
        let names: Vec<&str> = items.iter().map(|i| i["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["X", "Y", "A", "B", "C2"]);
    }

    #[test]
    fn remove_splices_out_or_noops() {
        let mutator = OptimisticMutator::new("id");
        let mut items = abc();
        assert!(mutator.on_removed(&mut items, &json!(2)));
        assert_eq!(items.len(), 2);
        assert!(!mutator.on_removed(&mut items, &json!(2)));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn nested_id_paths() {
        let mutator = OptimisticMutator::new("meta.key");
        let mut items = vec![json!({ "meta": { "key": "a" }, "v": 1 })];
        assert!(mutator.on_patched(&mut items, json!({ "meta": { "key": "a" }, "v": 2 })));
        assert_eq!(items[0]["v"], 2);
    }
}
