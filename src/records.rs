//! Payload-to-record extraction
//!
//! Pure functions that turn a JSON response body into rows and extract
//! record identities. Selection is data-path driven: an explicit dot-path
//! when configured, otherwise heuristic probing of the wrapper keys that
//! upstream APIs commonly nest their lists under.

use crate::types::{JsonValue, StringMap};
use tracing::warn;

/// Wrapper keys probed, in priority order, when no explicit data path is set
const WRAPPER_KEYS: [&str; 4] = ["data", "items", "results", "content"];

/// Select the record-bearing node of a response payload.
///
/// With an explicit `path`, walks the dot-path; when an intermediate node is
/// an array, descends into its first element. A missing path logs and yields
/// `Null`. Without a path: an array is returned as-is, an object is probed
/// for the first wrapper key holding an array, and a bare object with no
/// wrapper falls through unchanged.
pub fn select_payload(payload: &JsonValue, path: Option<&str>) -> JsonValue {
    let Some(path) = path else {
        if let JsonValue::Object(map) = payload {
            for key in WRAPPER_KEYS {
                if let Some(value @ JsonValue::Array(_)) = map.get(key) {
                    return value.clone();
                }
            }
        }
        return payload.clone();
    };

    let mut current = payload;
    for key in path.split('.') {
        if let JsonValue::Array(items) = current {
            match items.first() {
                Some(first) => current = first,
                None => return JsonValue::Null,
            }
        }
        match current.get(key) {
            Some(next) => current = next,
            None => {
                warn!(path, "data path not found in payload");
                return JsonValue::Null;
            }
        }
    }
    current.clone()
}

/// Coerce a selected payload node into a sequence of records.
///
/// Arrays become their items; a bare object becomes a single-element
/// sequence; anything else yields no records.
pub fn coerce_rows(value: JsonValue) -> Vec<JsonValue> {
    match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(_) => vec![value],
        _ => Vec::new(),
    }
}

/// Extract a record's identity via a dot-path into the record.
///
/// String and number identities are canonicalized to strings; booleans,
/// nulls, and structured values do not qualify as identities.
pub fn identity_of(record: &JsonValue, field: &str) -> Option<String> {
    path_string(record, field)
}

/// Resolve a dot-path to a scalar and render it as a string.
///
/// Only strings and numbers qualify; booleans, nulls, and structured
/// values yield `None`.
pub fn path_string(value: &JsonValue, path: &str) -> Option<String> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    match current {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Render one query-parameter value from a JSON value.
///
/// Matrix axes and base parameters may carry numbers or booleans; they are
/// sent on the wire as their plain string forms.
pub fn param_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collect the distinct identities of a record set, preserving first-seen order
pub fn distinct_identities(records: &[JsonValue], field: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for record in records {
        if let Some(id) = identity_of(record, field) {
            if seen.insert(id.clone()) {
                out.push(id);
            }
        }
    }
    out
}

/// Merge pagination parameters over a base parameter combination
pub fn merge_params(base: &StringMap, overlay: StringMap) -> StringMap {
    let mut merged = base.clone();
    merged.extend(overlay);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_bare_array() {
        let payload = json!([{"id": 1}, {"id": 2}]);
        let selected = select_payload(&payload, None);
        assert_eq!(selected, payload);
    }

    #[test]
    fn test_select_probes_wrapper_keys_in_order() {
        let payload = json!({"meta": 1, "items": [{"id": 1}]});
        assert_eq!(select_payload(&payload, None), json!([{"id": 1}]));

        // "data" wins over "results" regardless of key order in the object
        let payload = json!({"results": [1], "data": [2]});
        assert_eq!(select_payload(&payload, None), json!([2]));
    }

    #[test]
    fn test_select_wrapper_key_must_hold_array() {
        let payload = json!({"data": {"id": 1}});
        // "data" is not an array, so the bare object falls through unchanged
        assert_eq!(select_payload(&payload, None), payload);
    }

    #[test]
    fn test_select_explicit_path() {
        let payload = json!({"response": {"rows": [{"id": 7}]}});
        let selected = select_payload(&payload, Some("response.rows"));
        assert_eq!(selected, json!([{"id": 7}]));
    }

    #[test]
    fn test_select_path_descends_into_first_array_element() {
        let payload = json!({"batches": [{"rows": [{"id": 1}]}, {"rows": []}]});
        let selected = select_payload(&payload, Some("batches.rows"));
        assert_eq!(selected, json!([{"id": 1}]));
    }

    #[test]
    fn test_select_missing_path_is_null() {
        let payload = json!({"data": []});
        assert_eq!(select_payload(&payload, Some("no.such.path")), JsonValue::Null);
    }

    #[test]
    fn test_coerce_rows() {
        assert_eq!(coerce_rows(json!([1, 2])).len(), 2);
        assert_eq!(coerce_rows(json!({"id": 1})).len(), 1);
        assert!(coerce_rows(JsonValue::Null).is_empty());
        assert!(coerce_rows(json!("scalar")).is_empty());
    }

    #[test]
    fn test_identity_of() {
        assert_eq!(identity_of(&json!({"id": 42}), "id"), Some("42".into()));
        assert_eq!(
            identity_of(&json!({"id": "abc"}), "id"),
            Some("abc".into())
        );
        assert_eq!(
            identity_of(&json!({"meta": {"sku": "X-1"}}), "meta.sku"),
            Some("X-1".into())
        );
        assert_eq!(identity_of(&json!({"name": "x"}), "id"), None);
        assert_eq!(identity_of(&json!({"id": null}), "id"), None);
        assert_eq!(identity_of(&json!({"id": [1]}), "id"), None);
    }

    #[test]
    fn test_distinct_identities_order_and_dedup() {
        let records = vec![
            json!({"id": "b"}),
            json!({"id": "a"}),
            json!({"id": "b"}),
            json!({"name": "no-id"}),
        ];
        assert_eq!(distinct_identities(&records, "id"), vec!["b", "a"]);
    }

    #[test]
    fn test_param_value() {
        assert_eq!(param_value(&json!("x")), "x");
        assert_eq!(param_value(&json!(10)), "10");
        assert_eq!(param_value(&json!(true)), "true");
    }
}
