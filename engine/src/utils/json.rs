//! Canonical JSON normalization for content hashing

/// Normalize JSON to a canonical string (object keys sorted recursively).
///
/// Two semantically identical payloads always normalize to the same string,
/// which makes content hashes stable across key ordering differences.
pub fn normalize_json_for_hash(value: &serde_json::Value) -> String {
    use serde_json::Value as JsonValue;
    match value {
        JsonValue::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let sorted: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}:{}", k, normalize_json_for_hash(v)))
                .collect();
            format!("{{{}}}", sorted.join(","))
        }
        JsonValue::Array(arr) => {
            let items: Vec<String> = arr.iter().map(normalize_json_for_hash).collect();
            format!("[{}]", items.join(","))
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_irrelevant() {
        let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(normalize_json_for_hash(&a), normalize_json_for_hash(&b));
    }

    #[test]
    fn test_array_order_preserved() {
        let a = json!([1, 2]);
        let b = json!([2, 1]);
        assert_ne!(normalize_json_for_hash(&a), normalize_json_for_hash(&b));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(normalize_json_for_hash(&json!(null)), "null");
        assert_eq!(normalize_json_for_hash(&json!("s")), "\"s\"");
        assert_eq!(normalize_json_for_hash(&json!(1.5)), "1.5");
    }
}
