//! Run-scoped sequential id assignment.
//!
//! Each distinct [`PartitionKey`] owns an independent [`IdMap`]. Within a
//! partition, equal primary values always get the same id and new values get
//! the next integer, starting at 0, in first-seen order.
//!
//! The state lives in a [`RunStatus`] owned by the caller for the duration of
//! one conversion run and passed to every pipeline call.

use std::collections::HashMap;

use serde_json::Value;

/// Identifies one independent id sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// Names of the context columns.
    pub context_columns: Vec<String>,
    /// Canonical text of the context values.
    pub context_values: Vec<String>,
    /// Names of the primary columns.
    pub primary_columns: Vec<String>,
}

impl PartitionKey {
    pub fn new(context_columns: &[String], context_values: &[Value], primary_columns: &[String]) -> Self {
        Self {
            context_columns: context_columns.to_vec(),
            context_values: canonical_values(context_values),
            primary_columns: primary_columns.to_vec(),
        }
    }
}

/// Memoized id sequence for one partition.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    max_id: u64,
    value_to_id: HashMap<Vec<String>, u64>,
    id_to_value: HashMap<u64, Vec<Value>>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `values`, assigning the next one if they are new.
    pub fn assign(&mut self, values: &[Value]) -> u64 {
        let key = canonical_values(values);
        if let Some(id) = self.value_to_id.get(&key) {
            return *id;
        }
        let id = self.max_id;
        self.max_id += 1;
        self.value_to_id.insert(key, id);
        self.id_to_value.insert(id, values.to_vec());
        id
    }

    /// Id already assigned to `values`, if any.
    pub fn get_id(&self, values: &[Value]) -> Option<u64> {
        self.value_to_id.get(&canonical_values(values)).copied()
    }

    /// Values an id was assigned to.
    pub fn get_values(&self, id: u64) -> Option<&[Value]> {
        self.id_to_value.get(&id).map(Vec::as_slice)
    }

    /// Next id to be assigned; equals the number of distinct values seen.
    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    pub fn len(&self) -> usize {
        self.value_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value_to_id.is_empty()
    }
}

/// All id partitions of one run. Partitions are created lazily.
#[derive(Debug, Clone, Default)]
pub struct IdContextMap {
    partitions: HashMap<PartitionKey, IdMap>,
}

impl IdContextMap {
    /// Id of `primary_values` in the partition `key`.
    pub fn assign(&mut self, key: PartitionKey, primary_values: &[Value]) -> u64 {
        self.partitions.entry(key).or_default().assign(primary_values)
    }

    pub fn partition(&self, key: &PartitionKey) -> Option<&IdMap> {
        self.partitions.get(key)
    }

    /// Number of partitions created so far.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// State that outlives a single row during one conversion run.
#[derive(Debug, Clone, Default)]
pub struct RunStatus {
    pub id_context_map: IdContextMap,
}

impl RunStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

// JSON text keeps "1" and 1 apart and gives null a stable form.
fn canonical_values(values: &[Value]) -> Vec<String> {
    values.iter().map(Value::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn key(context: &[&str], values: &[Value], primary: &[&str]) -> PartitionKey {
        let context: Vec<String> = context.iter().map(|s| s.to_string()).collect();
        let primary: Vec<String> = primary.iter().map(|s| s.to_string()).collect();
        PartitionKey::new(&context, values, &primary)
    }

    #[test]
    fn test_id_map_memoizes() {
        let mut ids = IdMap::new();
        assert_eq!(ids.assign(&[json!("a")]), 0);
        assert_eq!(ids.assign(&[json!("b")]), 1);
        assert_eq!(ids.assign(&[json!("a")]), 0);
        assert_eq!(ids.max_id(), 2);
        assert_eq!(ids.get_id(&[json!("b")]), Some(1));
        assert_eq!(ids.get_values(1), Some(&[json!("b")][..]));
        assert_eq!(ids.get_id(&[json!("c")]), None);
    }

    #[test]
    fn test_id_map_distinguishes_types() {
        let mut ids = IdMap::new();
        assert_eq!(ids.assign(&[json!("1")]), 0);
        assert_eq!(ids.assign(&[json!(1)]), 1);
        assert_eq!(ids.assign(&[json!(null)]), 2);
    }

    #[test]
    fn test_partitions_are_independent() {
        let mut map = IdContextMap::default();
        let france = key(&["country"], &[json!("FR")], &["name"]);
        let germany = key(&["country"], &[json!("DE")], &["name"]);

        assert_eq!(map.assign(france.clone(), &[json!("Al")]), 0);
        assert_eq!(map.assign(germany.clone(), &[json!("Bo")]), 0);
        assert_eq!(map.assign(germany.clone(), &[json!("Al")]), 1);
        assert_eq!(map.assign(france.clone(), &[json!("Al")]), 0);
        assert_eq!(map.len(), 2);
        assert_eq!(map.partition(&germany).map(IdMap::len), Some(2));
    }

    proptest! {
        #[test]
        fn prop_replay_is_deterministic(
            rows in proptest::collection::vec(("[ab]", "[xyz]"), 0..30)
        ) {
            let run = |rows: &[(String, String)]| {
                let mut status = RunStatus::new();
                rows.iter()
                    .map(|(context, primary)| {
                        let key = key(&["ctx"], &[json!(context)], &["p"]);
                        status.id_context_map.assign(key, &[json!(primary)])
                    })
                    .collect::<Vec<u64>>()
            };
            let first = run(&rows);
            let second = run(&rows);
            prop_assert_eq!(&first, &second);

            // First-seen order within each context, starting at 0
            let mut seen: HashMap<(String, String), u64> = HashMap::new();
            let mut next: HashMap<String, u64> = HashMap::new();
            for ((context, primary), id) in rows.iter().zip(first) {
                let expected = *seen
                    .entry((context.clone(), primary.clone()))
                    .or_insert_with(|| {
                        let counter = next.entry(context.clone()).or_insert(0);
                        *counter += 1;
                        *counter - 1
                    });
                prop_assert_eq!(id, expected);
            }
        }
    }
}
