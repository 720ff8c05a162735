use serde_json::Value;

/// Extract the list from a collection response.
///
/// Accepts a bare array, a paginated `{"results": [...]}` page, or either of
/// those wrapped in `{"data": ...}`. Any other shape yields an empty list, so
/// callers always receive a sequence.
#[must_use]
pub fn normalize_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(results) = map.remove("results") {
                return normalize_list(results);
            }
            match map.remove("data") {
                Some(Value::Object(mut inner)) => inner
                    .remove("results")
                    .or_else(|| inner.remove("data"))
                    .map(normalize_list)
                    .unwrap_or_default(),
                Some(data) => normalize_list(data),
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}
