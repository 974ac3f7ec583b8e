//! Feature vector coercion
//!
//! Request bodies and stored rows carry loosely-typed values: numbers, numeric
//! strings with `,` as decimal separator, or junk. Everything is coerced to a
//! finite `f64`, with 0.0 as the fallback.

use serde_json::{Map, Value};

/// Loosely-typed feature mapping as received over HTTP
pub type FeatureMap = Map<String, Value>;

/// Parse a text cell, accepting `,` as decimal separator
pub fn parse_decimal(text: &str) -> f64 {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Coerce a JSON value to a float with a 0.0 fallback
pub fn to_float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_decimal(s),
        _ => 0.0,
    }
}

/// Value of `name` in `input`, 0.0 when absent
pub fn feature_value(input: &FeatureMap, name: &str) -> f64 {
    input.get(name).map(to_float).unwrap_or(0.0)
}

/// Reindex `input` onto the canonical feature order.
///
/// Missing names become 0.0 and unknown keys are dropped.
pub fn reindex(input: &FeatureMap, features: &[String]) -> Vec<f64> {
    features.iter().map(|name| feature_value(input, name)).collect()
}

/// True when every canonical feature is exactly zero.
///
/// An empty feature list never counts as all-zero.
pub fn all_features_zero(input: &FeatureMap, features: &[String]) -> bool {
    !features.is_empty() && features.iter().all(|name| feature_value(input, name) == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> FeatureMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_to_float_variants() {
        assert_eq!(to_float(&json!(3)), 3.0);
        assert_eq!(to_float(&json!(2.5)), 2.5);
        assert_eq!(to_float(&json!("1,75")), 1.75);
        assert_eq!(to_float(&json!(" 4.0 ")), 4.0);
        assert_eq!(to_float(&json!("abc")), 0.0);
        assert_eq!(to_float(&json!("nan")), 0.0);
        assert_eq!(to_float(&json!(null)), 0.0);
        assert_eq!(to_float(&json!(true)), 0.0);
        assert_eq!(to_float(&json!([1, 2])), 0.0);
    }

    #[test]
    fn test_reindex_fills_and_drops() {
        let input = map(json!({"B": "2,5", "EXTRA": 9, "A": 1}));
        let features = names(&["A", "B", "C"]);
        assert_eq!(reindex(&input, &features), vec![1.0, 2.5, 0.0]);
    }

    #[test]
    fn test_all_features_zero() {
        let features = names(&["A", "B"]);
        assert!(all_features_zero(&map(json!({})), &features));
        assert!(all_features_zero(&map(json!({"A": "0,0", "B": 0, "X": 7})), &features));
        assert!(!all_features_zero(&map(json!({"A": 0.01})), &features));
        assert!(!all_features_zero(&map(json!({})), &[]));
    }
}
