//! Helpers for interpreting leaf values.

use serde_json::Value;

/// Render a value as cell text.
///
/// Strings are returned as-is, null becomes the empty string, numbers and
/// booleans use their display form, and sequences or maps are written as
/// compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Truthiness of a value: null, `false`, zero, and empty strings,
/// sequences or maps are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Loose equality used by filters: equal values, or equal text renderings.
pub fn values_match(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        other => value_text(other) == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("abc")), "abc");
        assert_eq!(value_text(&json!(null)), "");
        assert_eq!(value_text(&json!(12)), "12");
        assert_eq!(value_text(&json!(true)), "true");
        assert_eq!(value_text(&json!(["a", 1])), r#"["a",1]"#);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([0])));
        assert!(is_truthy(&json!(-1)));
    }

    #[test]
    fn test_values_match() {
        assert!(values_match(&json!("x"), "x"));
        assert!(values_match(&json!(5), "5"));
        assert!(values_match(&json!(false), "false"));
        assert!(!values_match(&json!("y"), "x"));
    }
}
