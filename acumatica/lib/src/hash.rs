//! XXH64 content hashing for schema components.
//!
//! Schema fragments are hashed through a canonical JSON rendering: object
//! keys are sorted at every depth, except inside `properties` maps, whose
//! order decides the order of generated fields.

use serde_json::{Map, Value};
use xxhash_rust::xxh64::xxh64;

/// Computes XXH64 hash of the input string.
///
/// ## Examples
///
/// ```rust
/// use acumatica_client::hash::xx_hash;
///
/// assert_eq!(xx_hash("Customer"), xx_hash("Customer"));
/// assert_ne!(xx_hash("Customer"), xx_hash("Vendor"));
/// ```
pub fn xx_hash(content: &str) -> u64 {
    xxh64(content.as_bytes(), 0)
}

/// Key whose object value keeps its declaration order.
const ORDERED_KEY: &str = "properties";

/// Returns a copy of `value` with object keys in sorted order.
///
/// The entries of a `properties` object stay in declaration order; their
/// values are canonicalized as usual.
pub fn canonicalize(value: &Value) -> Value {
    canonicalize_map_entries(value, false)
}

fn canonicalize_map_entries(value: &Value, keep_order: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            if !keep_order {
                keys.sort();
            }
            let mut out = Map::with_capacity(map.len());
            for key in keys {
                let child = &map[key.as_str()];
                let ordered = !keep_order && key == ORDERED_KEY && child.is_object();
                out.insert(key.clone(), canonicalize_map_entries(child, ordered));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hashes a JSON value independent of object key order, except for the
/// order of `properties` entries.
///
/// ## Examples
///
/// ```rust
/// use acumatica_client::hash::hash_json;
/// use serde_json::json;
///
/// let a = json!({"type": "object", "properties": {"Name": {}}});
/// let b = json!({"properties": {"Name": {}}, "type": "object"});
/// assert_eq!(hash_json(&a), hash_json(&b));
/// ```
pub fn hash_json(value: &Value) -> u64 {
    xx_hash(&canonicalize(value).to_string())
}
