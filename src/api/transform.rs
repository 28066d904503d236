//! Response shape normalisers
//!
//! The backend wraps payloads inconsistently: bare arrays, `{data: [...]}`,
//! `{items: [...]}`, `{data: {results: [...]}}` and so on. These helpers
//! flatten those into the list, object and total a caller actually wants.

use serde_json::Value;

/// Fields that may hold a list payload, in lookup order
const LIST_FIELDS: [&str; 3] = ["data", "items", "results"];

/// Fields that may hold a total count, in lookup order
const TOTAL_FIELDS: [&str; 3] = ["total", "count", "totalCount"];

/// Items of a list response, empty when no list is found
pub fn extract_list(response: &Value) -> Vec<Value> {
    find_list(response).cloned().unwrap_or_default()
}

fn find_list(response: &Value) -> Option<&Vec<Value>> {
    match response {
        Value::Array(items) => Some(items),
        Value::Object(body) => {
            for field in LIST_FIELDS {
                if let Some(Value::Array(items)) = body.get(field) {
                    return Some(items);
                }
            }
            match body.get("data") {
                Some(Value::Object(data)) => LIST_FIELDS.iter().find_map(|field| match data.get(*field) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                }),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Object payload of a single-entity response, unwrapping `{data: {...}}`
pub fn extract_object(response: &Value) -> Value {
    match response.get("data") {
        Some(data @ Value::Object(_)) => data.clone(),
        _ => response.clone(),
    }
}

/// Total item count of a list response
///
/// Reads `total`, `count` or `totalCount` at the top level or under `data`,
/// then `pagination.total`, and falls back to the length of the list.
pub fn extract_total(response: &Value) -> u64 {
    let scopes = [Some(response), response.get("data")];
    for scope in scopes.into_iter().flatten() {
        for field in TOTAL_FIELDS {
            if let Some(total) = scope.get(field).and_then(as_count) {
                return total;
            }
        }
    }
    if let Some(total) = response.pointer("/pagination/total").and_then(as_count) {
        return total;
    }
    find_list(response).map_or(0, |items| items.len() as u64)
}

/// Accept counts sent as numbers or numeric strings
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_list_shapes() {
        let rooms = json!([{"id": 1}, {"id": 2}]);
        for response in [
            rooms.clone(),
            json!({"data": rooms.clone()}),
            json!({"items": rooms.clone()}),
            json!({"results": rooms.clone()}),
            json!({"data": {"items": rooms.clone()}}),
            json!({"data": {"results": rooms.clone(), "total": 2}}),
        ] {
            assert_eq!(extract_list(&response), rooms.as_array().unwrap().clone(), "{response}");
        }
    }

    #[test]
    fn test_extract_list_missing() {
        assert!(extract_list(&json!({"message": "ok"})).is_empty());
        assert!(extract_list(&json!({"data": {"id": 4}})).is_empty());
        assert!(extract_list(&Value::Null).is_empty());
    }

    #[test]
    fn test_extract_object() {
        let student = json!({"id": 9, "name": "Ada"});
        assert_eq!(extract_object(&json!({"data": student.clone()})), student);
        assert_eq!(extract_object(&student), student);
        // A list under data is not an entity
        let listing = json!({"data": [1, 2]});
        assert_eq!(extract_object(&listing), listing);
    }

    #[test]
    fn test_extract_total() {
        assert_eq!(extract_total(&json!({"data": [], "total": 57})), 57);
        assert_eq!(extract_total(&json!({"data": [], "count": "12"})), 12);
        assert_eq!(extract_total(&json!({"data": {"items": [], "totalCount": 3}})), 3);
        assert_eq!(extract_total(&json!({"data": [], "pagination": {"total": 40}})), 40);
        assert_eq!(extract_total(&json!({"items": [1, 2, 3]})), 3);
        assert_eq!(extract_total(&json!([1, 2])), 2);
        assert_eq!(extract_total(&json!({"message": "none"})), 0);
    }
}
