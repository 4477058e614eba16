//! Row model.
//!
//! A [`Row`] carries the same data twice: `flat`, an ordered map of dotted
//! paths to leaves, and `nested`, the equivalent tree. Every mutation goes
//! through [`Row`] methods which update both views before returning.
//!
//! Two namespaces are reserved inside every row:
//!
//! - [`STAGING_FIELD`] holds values produced by actions. They are not part of
//!   the output schema unless picked by the column remap.
//! - [`INPUT_FIELD`] (below staging) holds the original input columns, so
//!   `_staging.input.title` is the `title` cell as read.

pub mod fields;
pub mod value;

use serde_json::{Map, Value};

use crate::error::FieldError;

pub use fields::{
    delete, flatten, flatten_into, join_path, nest, nest_keeping_maps, pop, search, set, validate_path,
    PATH_DELIMITER,
};
pub use value::{is_truthy, value_text, values_match};

/// Top-level key of the staging namespace.
pub const STAGING_FIELD: &str = "_staging";

/// Key of the input snapshot below the staging namespace.
pub const INPUT_FIELD: &str = "input";

/// Path of `field` inside the staging namespace.
pub fn staging_path(field: &str) -> String {
    format!("{STAGING_FIELD}{PATH_DELIMITER}{field}")
}

/// Path of `field` inside the input snapshot.
pub fn input_path(field: &str) -> String {
    format!("{STAGING_FIELD}{PATH_DELIMITER}{INPUT_FIELD}{PATH_DELIMITER}{field}")
}

/// Prefix shared by every staging key in a flat row.
pub fn staging_prefix() -> String {
    format!("{STAGING_FIELD}{PATH_DELIMITER}")
}

/// Prefix shared by every input snapshot key in a flat row.
pub fn input_prefix() -> String {
    format!("{STAGING_FIELD}{PATH_DELIMITER}{INPUT_FIELD}{PATH_DELIMITER}")
}

/// Name given to the column at 1-based `position` when its header is blank.
pub fn blank_column_name(position: usize) -> String {
    format!("column_{position}")
}

/// Column candidates for a field reference, in lookup order: a value
/// produced into staging, the raw path, then the input snapshot.
fn column_candidates(path: &str) -> [String; 3] {
    [staging_path(path), path.to_string(), input_path(path)]
}

/// One unit of work, in flat and nested form.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Ordered dotted-path view.
    pub flat: Map<String, Value>,
    /// Tree view derived from `flat`.
    pub nested: Value,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            flat: Map::new(),
            nested: Value::Object(Map::new()),
        }
    }
}

impl Row {
    /// Wrap a flat map, deriving the nested view.
    ///
    /// The staging namespace and the input snapshot always nest as maps,
    /// even when their keys are `0..n`.
    pub fn from_flat(flat: Map<String, Value>) -> Result<Self, FieldError> {
        let input_root = join_path(STAGING_FIELD, INPUT_FIELD);
        let nested = nest_keeping_maps(&flat, &[STAGING_FIELD, input_root.as_str()])?;
        Ok(Self { flat, nested })
    }

    /// Build a row from an input record: every column lands in the input
    /// snapshot, keeping column order. Blank column names become
    /// `column_<n>`.
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, FieldError> {
        let mut flat = Map::new();
        for (index, (column, value)) in record.iter().enumerate() {
            let path = if column.trim().is_empty() {
                input_path(&blank_column_name(index + 1))
            } else {
                input_path(column)
            };
            flatten_into(value, &path, &mut flat);
        }
        Self::from_flat(flat)
    }

    /// Value at an exact path of the nested view.
    pub fn get(&self, path: &str) -> Option<&Value> {
        search(&self.nested, path)
    }

    /// Resolve a field reference against the nested view.
    ///
    /// Returns the value and the path it was found at.
    pub fn search_column(&self, field: &str) -> Option<(&Value, String)> {
        column_candidates(field)
            .into_iter()
            .find_map(|path| search(&self.nested, &path).map(|value| (value, path)))
    }

    /// Resolve a field reference against flat keys only.
    pub fn search_flat_column(&self, field: &str) -> Option<(&Value, String)> {
        column_candidates(field)
            .into_iter()
            .find_map(|path| self.flat.get(&path).map(|value| (value, path)))
    }

    /// Write `value` at `path` in both views.
    ///
    /// Overwriting an existing leaf with a leaf keeps its position in the
    /// flat view; anything else replaces the subtree at the end.
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<(), FieldError> {
        set(&mut self.nested, path, value.clone())?;

        let is_leaf = !matches!(&value, Value::Object(m) if !m.is_empty())
            && !matches!(&value, Value::Array(a) if !a.is_empty());
        if is_leaf && self.flat.contains_key(path) {
            self.flat.insert(path.to_string(), value);
        } else {
            // A leaf on an ancestor path was replaced by a map in the tree.
            for (index, _) in path.match_indices(PATH_DELIMITER) {
                self.flat.shift_remove(&path[..index]);
            }
            delete(&mut self.flat, path);
            flatten_into(&value, path, &mut self.flat);
        }
        Ok(())
    }

    /// Write `value` at `field` inside the staging namespace.
    pub fn set_staging_value(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        self.set_value(&staging_path(field), value)
    }

    /// Remove `path` and its subtree from both views.
    pub fn pop_value(&mut self, path: &str) -> Option<Value> {
        delete(&mut self.flat, path);
        pop(&mut self.nested, path)
    }

    /// Whether the staging namespace holds a value at `field`.
    pub fn has_staging_value(&self, field: &str) -> bool {
        self.get(&staging_path(field)).is_some()
    }

    /// Names of the input snapshot's top-level fields, in order.
    pub fn input_fields(&self) -> Vec<String> {
        match self.get(STAGING_FIELD).and_then(|s| s.get(INPUT_FIELD)) {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Flat view without the staging namespace.
    pub fn public_fields(&self) -> Map<String, Value> {
        let prefix = staging_prefix();
        self.flat
            .iter()
            .filter(|(key, _)| !key.starts_with(&prefix) && key.as_str() != STAGING_FIELD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_from_record_fills_input_snapshot() {
        let row = Row::from_record(&record(json!({"name": "Al", "year": "1999"}))).unwrap();
        let keys: Vec<&str> = row.flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_staging.input.name", "_staging.input.year"]);
        assert_eq!(row.nested, json!({"_staging": {"input": {"name": "Al", "year": "1999"}}}));
        assert_eq!(row.input_fields(), vec!["name", "year"]);
    }

    #[test]
    fn test_blank_column_names() {
        let row = Row::from_record(&record(json!({"name": "Al", "": "x"}))).unwrap();
        assert_eq!(row.input_fields(), vec!["name", "column_2"]);
        assert_eq!(row.get("_staging.input.column_2"), Some(&json!("x")));
    }

    #[test]
    fn test_numeric_column_names_stay_a_map() {
        let row = Row::from_record(&record(json!({"0": "a", "1": "b"}))).unwrap();
        assert_eq!(row.nested, json!({"_staging": {"input": {"0": "a", "1": "b"}}}));
        assert_eq!(row.input_fields(), vec!["0", "1"]);
        let (value, _) = row.search_column("1").unwrap();
        assert_eq!(value, &json!("b"));
    }

    #[test]
    fn test_search_column_order() {
        let mut row = Row::from_record(&record(json!({"title": "raw"}))).unwrap();
        let (value, path) = row.search_column("title").unwrap();
        assert_eq!(value, &json!("raw"));
        assert_eq!(path, "_staging.input.title");

        row.set_staging_value("title", json!("produced")).unwrap();
        let (value, path) = row.search_column("title").unwrap();
        assert_eq!(value, &json!("produced"));
        assert_eq!(path, "_staging.title");

        assert!(row.search_column("missing").is_none());
    }

    #[test]
    fn test_set_value_keeps_views_in_sync() {
        let mut row = Row::from_record(&record(json!({"a": "1"}))).unwrap();
        row.set_staging_value("tags", json!(["x", "y"])).unwrap();
        row.set_staging_value("tags", json!("z")).unwrap();
        row.set_staging_value("a", json!("2")).unwrap();
        assert_eq!(nest(&row.flat).unwrap(), row.nested);
        assert_eq!(row.flat.get("_staging.tags"), Some(&json!("z")));
        assert!(!row.flat.contains_key("_staging.tags.0"));

        // A leaf replaced by a subtree
        row.set_staging_value("a.b", json!(1)).unwrap();
        assert!(!row.flat.contains_key("_staging.a"));
        assert_eq!(nest(&row.flat).unwrap(), row.nested);
    }

    #[test]
    fn test_overwrite_leaf_keeps_position() {
        let mut row = Row::from_flat(record(json!({"a": 1, "b": 2}))).unwrap();
        row.set_value("a", json!(3)).unwrap();
        let keys: Vec<&str> = row.flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_pop_value() {
        let mut row = Row::from_flat(record(json!({"a.b": 1, "a.c": 2, "d": 3}))).unwrap();
        assert_eq!(row.pop_value("a"), Some(json!({"b": 1, "c": 2})));
        assert_eq!(row.flat, record(json!({"d": 3})));
        assert_eq!(row.nested, json!({"d": 3}));
        assert_eq!(row.pop_value("a"), None);
    }

    #[test]
    fn test_public_fields() {
        let row = Row::from_flat(record(json!({"name": "Al", "_staging.x": 1}))).unwrap();
        assert_eq!(row.public_fields(), record(json!({"name": "Al"})));
    }
}
