// Small collection helpers shared by the pipeline stages

use std::collections::HashMap;
use std::hash::Hash;

use serde_json::{Map, Value};

/// Drop entries whose value is empty or whitespace-only
pub fn filter_empty<K>(map: HashMap<K, String>) -> HashMap<K, String>
where
    K: Eq + Hash,
{
    map.into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
}

/// Zip keys with values into a JSON object, skipping missing values
pub fn to_object<K, I, V>(keys: I, values: V) -> Map<String, Value>
where
    K: Into<String>,
    I: IntoIterator<Item = K>,
    V: IntoIterator<Item = Option<Value>>,
{
    keys.into_iter()
        .zip(values)
        .filter_map(|(key, value)| value.map(|v| (key.into(), v)))
        .collect()
}
