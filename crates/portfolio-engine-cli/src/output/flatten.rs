use serde_json::{Map, Value};

/// Flatten nested objects into dotted `field.sub_field` rows. Arrays of
/// objects are left for the caller (they render as their own table).
pub fn flatten_object(map: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut rows = Vec::new();
    for (key, val) in map {
        push_rows(key.clone(), val, &mut rows);
    }
    rows
}

fn push_rows(prefix: String, value: &Value, rows: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(inner) if !inner.is_empty() => {
            for (key, val) in inner {
                push_rows(format!("{}.{}", prefix, key), val, rows);
            }
        }
        _ => rows.push((prefix, value.clone())),
    }
}

/// Top-level fields holding arrays of objects, e.g. frontier points.
pub fn object_arrays(map: &Map<String, Value>) -> Vec<(&str, &[Value])> {
    map.iter()
        .filter_map(|(key, val)| match val {
            Value::Array(items) if matches!(items.first(), Some(Value::Object(_))) => {
                Some((key.as_str(), items.as_slice()))
            }
            _ => None,
        })
        .collect()
}
