//! Dotted-path addressing over row trees.
//!
//! A path such as `creator.0.name` walks maps by key and sequences by index.
//! [`flatten`] and [`nest`] convert between a flat ordered map keyed by such
//! paths and the equivalent tree.

use serde_json::{Map, Value};

use crate::error::FieldError;

/// Separator between path segments.
pub const PATH_DELIMITER: char = '.';

/// Resolve `path` inside `tree`.
///
/// An exact key match at the current level wins over descending, so keys that
/// themselves contain the delimiter stay addressable.
pub fn search<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    match tree {
        Value::Array(items) => {
            if let Some(index) = parse_index(path) {
                return items.get(index);
            }
        }
        Value::Object(map) => {
            if let Some(value) = map.get(path) {
                return Some(value);
            }
        }
        _ => return None,
    }

    let (head, rest) = path.split_once(PATH_DELIMITER)?;
    let child = match tree {
        Value::Object(map) => map.get(head)?,
        Value::Array(items) => items.get(parse_index(head)?)?,
        _ => return None,
    };
    search(child, rest)
}

/// Write `value` at `path`, creating intermediate maps as needed.
///
/// Scalar intermediates are replaced by maps. Inside a sequence the segment
/// must be an existing index, or the length of the sequence to append.
pub fn set(tree: &mut Value, path: &str, value: Value) -> Result<(), FieldError> {
    let segments = split_path(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(FieldError::InvalidPath(path.to_string()));
    };

    let mut node = tree;
    for segment in parents {
        node = child_mut(node, segment, path)?;
    }

    ensure_container(node);
    match node {
        Value::Array(items) => {
            let index = index_for(last, path)?;
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                return Err(invalid_index(path, last));
            }
        }
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
        }
        _ => return Err(FieldError::InvalidPath(path.to_string())),
    }
    Ok(())
}

/// Remove `path` from `tree` and return the removed subtree.
pub fn pop(tree: &mut Value, path: &str) -> Option<Value> {
    let (parent, last) = match path.rsplit_once(PATH_DELIMITER) {
        Some((parent, last)) => (search_mut(tree, parent)?, last),
        None => (tree, path),
    };

    match parent {
        Value::Object(map) => map.shift_remove(last),
        Value::Array(items) => {
            let index = parse_index(last)?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

/// Remove `path` and every key below it from a flat map.
pub fn delete(flat: &mut Map<String, Value>, path: &str) {
    let prefix = format!("{path}{PATH_DELIMITER}");
    flat.retain(|key, _| key != path && !key.starts_with(&prefix));
}

/// Flatten a tree into an ordered map of dotted paths.
///
/// Empty maps and sequences are kept as leaves so the conversion stays
/// reversible.
pub fn flatten(tree: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    match tree {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(child, key, &mut flat);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, &index.to_string(), &mut flat);
            }
        }
        _ => {}
    }
    flat
}

/// Flatten `value` into `flat` under the `prefix` path.
pub fn flatten_into(value: &Value, prefix: &str, flat: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(child, &join_path(prefix, key), flat);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, &join_path(prefix, &index.to_string()), flat);
            }
        }
        leaf => {
            flat.insert(prefix.to_string(), leaf.clone());
        }
    }
}

/// Build the tree equivalent of a flat map.
///
/// Maps whose keys are exactly `0..n` in order become sequences. The root is
/// always a map.
pub fn nest(flat: &Map<String, Value>) -> Result<Value, FieldError> {
    nest_keeping_maps(flat, &[])
}

/// [`nest`], except that the maps at the `keep` paths are never turned into
/// sequences.
pub fn nest_keeping_maps(flat: &Map<String, Value>, keep: &[&str]) -> Result<Value, FieldError> {
    let mut root = Map::new();
    for (key, value) in flat {
        insert_nested(&mut root, key, value.clone())?;
    }
    for (key, child) in root.iter_mut() {
        restore_sequences(child, key, keep);
    }
    Ok(Value::Object(root))
}

/// Check that `path` has no empty segment.
pub fn validate_path(path: &str) -> Result<(), FieldError> {
    split_path(path).map(|_| ())
}

/// Join two path fragments with the delimiter.
pub fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{PATH_DELIMITER}{key}")
    }
}

fn insert_nested(root: &mut Map<String, Value>, key: &str, value: Value) -> Result<(), FieldError> {
    let segments = split_path(key)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(FieldError::InvalidPath(key.to_string()));
    };

    let mut node = root;
    let mut walked = String::new();
    for segment in parents {
        walked = join_path(&walked, segment);
        let entry = node
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(child) => node = child,
            _ => return Err(FieldError::PathConflict { path: walked }),
        }
    }

    if node.contains_key(*last) {
        return Err(FieldError::PathConflict {
            path: key.to_string(),
        });
    }
    node.insert((*last).to_string(), value);
    Ok(())
}

fn restore_sequences(value: &mut Value, path: &str, keep: &[&str]) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                restore_sequences(child, &join_path(path, key), keep);
            }
            let is_sequence = !keep.contains(&path)
                && !map.is_empty()
                && map
                    .keys()
                    .enumerate()
                    .all(|(index, key)| *key == index.to_string());
            if is_sequence {
                let items: Vec<Value> = std::mem::take(map).into_iter().map(|(_, v)| v).collect();
                *value = Value::Array(items);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter_mut().enumerate() {
                restore_sequences(child, &join_path(path, &index.to_string()), keep);
            }
        }
        _ => {}
    }
}

fn search_mut<'a>(tree: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut node = tree;
    for segment in path.split(PATH_DELIMITER) {
        node = match node {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(parse_index(segment)?)?,
            _ => return None,
        };
    }
    Some(node)
}

fn child_mut<'a>(node: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value, FieldError> {
    ensure_container(node);
    match node {
        Value::Array(items) => {
            let index = index_for(segment, path)?;
            if index == items.len() {
                items.push(Value::Object(Map::new()));
            }
            items
                .get_mut(index)
                .ok_or_else(|| invalid_index(path, segment))
        }
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        _ => Err(FieldError::InvalidPath(path.to_string())),
    }
}

fn ensure_container(node: &mut Value) {
    if !node.is_object() && !node.is_array() {
        *node = Value::Object(Map::new());
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, FieldError> {
    let segments: Vec<&str> = path.split(PATH_DELIMITER).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(FieldError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn parse_index(segment: &str) -> Option<usize> {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}

fn index_for(segment: &str, path: &str) -> Result<usize, FieldError> {
    parse_index(segment).ok_or_else(|| invalid_index(path, segment))
}

fn invalid_index(path: &str, segment: &str) -> FieldError {
    FieldError::InvalidIndex {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}
