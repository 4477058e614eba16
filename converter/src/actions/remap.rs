//! Column remap.
//!
//! Projects a processed row onto the output schema described by a pick list.
//! Picked values land at their target paths; staging data is carried along;
//! any other public key is moved into staging unless it merely repeats the
//! input cell of the same name.

use serde_json::Map;
use tracing::trace;

use super::types::PickConfig;
use crate::error::FieldError;
use crate::row::{delete, flatten_into, input_path, input_prefix, staging_path, staging_prefix, Row, STAGING_FIELD};

/// Re-project `row` through `picks`.
///
/// An empty pick list selects every input column under its own name.
pub fn remap_columns(row: Row, picks: &[PickConfig]) -> Result<Row, FieldError> {
    let synthesized: Vec<PickConfig>;
    let picks = if picks.is_empty() {
        synthesized = row
            .input_fields()
            .into_iter()
            .map(|field| PickConfig::new(field.clone(), field))
            .collect();
        synthesized.as_slice()
    } else {
        picks
    };

    let mut output = Map::new();
    let mut picked: Vec<String> = Vec::new();
    for pick in picks {
        if let Some((value, path)) = row.search_column(&pick.source) {
            trace!(target_field = %pick.target, source = %path, "picked column");
            delete(&mut output, &pick.target);
            flatten_into(value, &pick.target, &mut output);
            picked.push(path);
        }
    }

    let input = input_prefix();
    let staging = staging_prefix();
    for (key, value) in &row.flat {
        if is_picked(key, &picked) && !key.starts_with(&input) {
            continue;
        }
        if output.contains_key(key) {
            continue;
        }
        if key.starts_with(&staging) || key == STAGING_FIELD {
            output.insert(key.clone(), value.clone());
            continue;
        }
        if row.flat.get(&input_path(key)) == Some(value) {
            continue;
        }
        output.insert(staging_path(key), value.clone());
    }

    Row::from_flat(output)
}

/// A flat key is picked when it is a picked path or lies below one.
fn is_picked(key: &str, picked: &[String]) -> bool {
    picked.iter().any(|path| {
        key.strip_prefix(path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn flat(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn keys(row: &Row) -> Vec<&str> {
        row.flat.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_empty_picks_use_input_columns() {
        let row = Row::from_flat(flat(json!({"_staging.input.name": "Al"}))).unwrap();
        let out = remap_columns(row, &[]).unwrap();
        assert_eq!(out.get("name"), Some(&json!("Al")));
        assert_eq!(keys(&out), vec!["name", "_staging.input.name"]);
        assert_eq!(out.public_fields(), flat(json!({"name": "Al"})));
    }

    #[test]
    fn test_picks_from_staging() {
        let mut row = Row::from_flat(flat(json!({"_staging.input.Titre": "Song"}))).unwrap();
        row.set_staging_value("title", json!("Song")).unwrap();
        row.set_staging_value("extra", json!(1)).unwrap();

        let out = remap_columns(row, &[PickConfig::new("work.title", "title")]).unwrap();
        assert_eq!(out.get("work"), Some(&json!({"title": "Song"})));
        assert!(!out.flat.contains_key("_staging.title"));
        assert_eq!(out.flat.get("_staging.extra"), Some(&json!(1)));
        assert_eq!(out.flat.get("_staging.input.Titre"), Some(&json!("Song")));
    }

    #[test]
    fn test_subtree_pick_skips_children() {
        let mut row = Row::default();
        row.set_staging_value("work", json!({"title": "Song", "tags": ["a", "b"]}))
            .unwrap();

        let out = remap_columns(row, &[PickConfig::new("w", "work")]).unwrap();
        assert_eq!(keys(&out), vec!["w.title", "w.tags.0", "w.tags.1"]);
        assert_eq!(out.nested, json!({"w": {"title": "Song", "tags": ["a", "b"]}}));
    }

    #[test]
    fn test_unpicked_public_keys_move_to_staging() {
        let row = Row::from_flat(flat(json!({
            "_staging.input.name": "Al",
            "name": "Al",
            "note": "kept aside",
        })))
        .unwrap();
        let out = remap_columns(row, &[PickConfig::new("id", "missing")]).unwrap();
        assert!(out.get("id").is_none());
        assert!(!out.flat.contains_key("name"));
        assert!(!out.flat.contains_key("_staging.name"));
        assert_eq!(out.flat.get("_staging.note"), Some(&json!("kept aside")));
    }

    #[test]
    fn test_changed_public_key_is_kept_in_staging() {
        let row = Row::from_flat(flat(json!({
            "_staging.input.name": "Al",
            "name": "Albert",
        })))
        .unwrap();
        let out = remap_columns(row, &[PickConfig::new("other", "missing")]).unwrap();
        assert_eq!(out.flat.get("_staging.name"), Some(&json!("Albert")));
    }

    #[test]
    fn test_is_picked() {
        let picked = vec!["_staging.work".to_string()];
        assert!(is_picked("_staging.work", &picked));
        assert!(is_picked("_staging.work.title", &picked));
        assert!(!is_picked("_staging.worker", &picked));
    }
}
