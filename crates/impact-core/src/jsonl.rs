use serde_json::Value;

/// Parse one newline-delimited JSON line into an object.
///
/// Blank lines, malformed JSON, and non-object values all yield `None`; a
/// damaged line never affects its neighbors.
pub fn parse_object_line(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
