//! Deep merge and dotted-path lookup over JSON values.
//!
//! Configuration layers and run-time context share the same merge rule:
//! objects merge key by key, everything else (arrays included) is replaced.

use serde_json::Value;

/// Merges `patch` into `base`.
///
/// Objects are merged recursively. Arrays, scalars and `null` in `patch`
/// replace whatever `base` held at that key.
pub fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Returns a merged copy of `layers`, later layers taking precedence.
#[must_use]
pub fn merged<I>(layers: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    let mut result = Value::Object(serde_json::Map::new());
    for layer in layers {
        deep_merge(&mut result, layer);
    }
    result
}

/// Looks up a dotted path (`repo.owner`) in `value`.
///
/// An empty path returns `value` itself.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
