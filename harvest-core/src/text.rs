//! Text normalization helpers used by the record normalizers

use serde_json::Value;

/// Remove NUL characters and collapse every whitespace run to a single space.
pub fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\0')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a JSON scalar as a CSV-ready string.
///
/// Strings pass through, numbers and booleans use their JSON spelling, `null`
/// and containers become the empty string.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Look up `field` in a JSON object and render it, falling back to `default`.
pub fn field_or(object: &Value, field: &str, default: &str) -> String {
    match object.get(field) {
        Some(Value::Null) | None => default.to_string(),
        Some(v) => scalar_to_string(v),
    }
}

/// `"1"` when the field holds the string or number one, `"0"` otherwise.
pub fn flag(object: &Value, field: &str) -> &'static str {
    match object.get(field) {
        Some(Value::String(s)) if s == "1" => "1",
        Some(Value::Number(n)) if n.as_i64() == Some(1) => "1",
        _ => "0",
    }
}

/// Sort and join names with `separator`.
pub fn join_sorted<I, S>(names: I, separator: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = names.into_iter().map(|s| s.as_ref().to_string()).collect();
    names.sort();
    names.dedup();
    names.join(separator)
}
