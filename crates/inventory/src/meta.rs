//! Nested `meta` updates addressed by dot-separated key paths.

use serde_json::{Map, Value as JsonValue};

use stockroom_core::{DomainError, DomainResult};

/// Set `path` (e.g. `"dimensions.width"`) to `value` inside `meta`.
///
/// Missing intermediate objects are created. An intermediate that exists but
/// is not an object is a validation error; nothing is changed in that case.
pub fn set_path(meta: &mut Map<String, JsonValue>, path: &str, value: JsonValue) -> DomainResult<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DomainError::validation(format!("invalid meta key path '{path}'")));
    }

    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Err(DomainError::validation("empty meta key path")),
    };

    let mut cursor = meta;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = cursor
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        cursor = match slot {
            JsonValue::Object(map) => map,
            _ => {
                return Err(DomainError::validation(format!(
                    "meta key '{}' is not an object",
                    segments[..=depth].join(".")
                )));
            }
        };
    }
    cursor.insert(last.to_string(), value);
    Ok(())
}

/// Apply several key-path updates; stops at the first invalid path.
pub fn apply_updates(
    meta: &mut Map<String, JsonValue>,
    updates: &Map<String, JsonValue>,
) -> DomainResult<()> {
    let mut staged = meta.clone();
    for (path, value) in updates {
        set_path(&mut staged, path, value.clone())?;
    }
    *meta = staged;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: JsonValue) -> Map<String, JsonValue> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn sets_nested_keys_and_keeps_siblings() {
        let mut meta = map(json!({"dims": {"h": 2}, "color": "red"}));
        set_path(&mut meta, "dims.w", json!(5)).unwrap();
        assert_eq!(JsonValue::Object(meta), json!({"dims": {"h": 2, "w": 5}, "color": "red"}));
    }

    #[test]
    fn creates_missing_intermediates() {
        let mut meta = Map::new();
        set_path(&mut meta, "a.b.c", json!(true)).unwrap();
        assert_eq!(JsonValue::Object(meta), json!({"a": {"b": {"c": true}}}));
    }

    #[test]
    fn scalar_intermediate_is_rejected_atomically() {
        let mut meta = map(json!({"color": "red"}));
        let updates = map(json!({"size": 3, "color.shade": "dark"}));
        assert!(apply_updates(&mut meta, &updates).is_err());
        assert_eq!(JsonValue::Object(meta), json!({"color": "red"}));
    }

    #[test]
    fn empty_segment_is_rejected() {
        let mut meta = Map::new();
        assert!(set_path(&mut meta, "a..b", json!(1)).is_err());
    }
}
