use serde_json::Value;

/// Required trimmed string param; empty counts as missing.
pub fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// String param where the empty string is meaningful (clearing an image URL).
pub fn raw_str_param(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(String::from)
}

pub fn i64_param(params: &Value, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

pub fn bool_param(params: &Value, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

/// Id that may be explicitly null (or absent): both mean "none selected".
/// Anything else must be an integer.
pub fn opt_id_param(params: &Value, key: &str) -> Result<Option<i64>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("{key} must be an integer or null")),
    }
}

/// Integer id list param (e.g. subjectIds). Absent means empty.
pub fn id_list_param(params: &Value, key: &str) -> Result<Vec<i64>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or_else(|| format!("{key} must contain only integers"))
            })
            .collect(),
        Some(_) => Err(format!("{key} must be an array of integers")),
    }
}
