//! Loose comparison (`==`, `<`, `<=>`, ...)
//!
//! Identity (`===`) lives on [`Value::identical`]; this module follows the
//! PHP 8 comparison table where numeric strings compare as numbers and a
//! number against a non-numeric string compares as strings.

use super::value::{parse_numeric, Array, Numeric, Value};
use std::cmp::Ordering;

fn compare_numbers(a: Numeric, b: Numeric) -> Option<Ordering> {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => Some(x.cmp(&y)),
        (x, y) => x.as_f64().partial_cmp(&y.as_f64()),
    }
}

fn number_of(value: &Value) -> Option<Numeric> {
    match value {
        Value::Int(n) => Some(Numeric::Int(*n)),
        Value::Float(f) => Some(Numeric::Float(*f)),
        _ => None,
    }
}

/// Number against string: numeric strings compare numerically, anything
/// else compares the number's string form
fn compare_number_string(n: Numeric, s: &str) -> Option<Ordering> {
    match parse_numeric(s) {
        Some(other) => compare_numbers(n, other),
        None => {
            let text = n.to_value().to_php_string();
            Some(text.as_str().cmp(s))
        }
    }
}

fn compare_strings(a: &str, b: &str) -> Option<Ordering> {
    match (parse_numeric(a), parse_numeric(b)) {
        (Some(x), Some(y)) => compare_numbers(x, y),
        _ => Some(a.cmp(b)),
    }
}

/// Arrays with fewer elements are smaller; otherwise compared key by key in
/// the left operand's order. A key missing on the right is uncomparable.
fn compare_arrays(a: &Array, b: &Array) -> Option<Ordering> {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        other => return Some(other),
    }
    for (key, left) in a.iter() {
        let right = b.get(key)?;
        match compare(left, right)? {
            Ordering::Equal => {}
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

/// Loose ordering; `None` when the operands are uncomparable (NaN, arrays
/// with differing keys)
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Void | Value::Null, Value::Void | Value::Null) => Some(Ordering::Equal),
        (Value::Void | Value::Null, Value::Str(s)) => Some("".cmp(s.as_str())),
        (Value::Str(s), Value::Void | Value::Null) => Some(s.as_str().cmp("")),
        (Value::Bool(_) | Value::Void | Value::Null, _)
        | (_, Value::Bool(_) | Value::Void | Value::Null) => Some(a.to_bool().cmp(&b.to_bool())),
        (Value::Str(x), Value::Str(y)) => compare_strings(x, y),
        (Value::Array(x), Value::Array(y)) => compare_arrays(x, y),
        (Value::Array(_), _) => Some(Ordering::Greater),
        (_, Value::Array(_)) => Some(Ordering::Less),
        (Value::Str(s), other) => {
            compare_number_string(number_of(other)?, s).map(Ordering::reverse)
        }
        (other, Value::Str(s)) => compare_number_string(number_of(other)?, s),
        (x, y) => compare_numbers(number_of(x)?, number_of(y)?),
    }
}

/// `==`
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, left)| y.get(key).is_some_and(|right| loose_eq(left, right)))
        }
        _ => compare(a, b) == Some(Ordering::Equal),
    }
}

/// `<=>`; uncomparable operands count as greater
pub fn spaceship(a: &Value, b: &Value) -> i64 {
    match compare(a, b) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) | None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::value::ArrayKey;

    fn list(values: &[i64]) -> Value {
        Value::Array(Array::from_list(values.iter().map(|n| Value::Int(*n))))
    }

    #[test]
    fn test_numeric_strings_compare_as_numbers() {
        assert!(loose_eq(&Value::str("1e3"), &Value::str("1000")));
        assert!(loose_eq(&Value::Int(100), &Value::str("1e2")));
        assert!(loose_eq(&Value::str(" 42"), &Value::Int(42)));
        assert!(!loose_eq(&Value::str("abc"), &Value::str("ABC")));
    }

    #[test]
    fn test_php8_number_vs_non_numeric_string() {
        assert!(!loose_eq(&Value::Int(0), &Value::str("foo")));
        assert!(!loose_eq(&Value::str("1"), &Value::str("01a")));
        assert!(loose_eq(&Value::Int(0), &Value::str("0")));
    }

    #[test]
    fn test_null_and_bool_rules() {
        assert!(loose_eq(&Value::Null, &Value::Bool(false)));
        assert!(loose_eq(&Value::Null, &Value::str("")));
        assert!(!loose_eq(&Value::Null, &Value::str("0")));
        assert!(loose_eq(&Value::Null, &list(&[])));
        assert!(loose_eq(&Value::Bool(true), &Value::str("a")));
        assert!(loose_eq(&Value::Int(0), &Value::Null));
    }

    #[test]
    fn test_array_equality_ignores_order() {
        let a: Array = [(ArrayKey::Int(0), Value::Int(1)), (ArrayKey::Int(1), Value::Int(2))]
            .into_iter()
            .collect();
        let b: Array = [(ArrayKey::Int(1), Value::str("2")), (ArrayKey::Int(0), Value::Int(1))]
            .into_iter()
            .collect();
        assert!(loose_eq(&Value::Array(a), &Value::Array(b)));
        assert!(!loose_eq(&list(&[1, 2]), &list(&[2, 1])));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(compare(&Value::Int(1), &Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(compare(&Value::str("abc"), &Value::str("abd")), Some(Ordering::Less));
        assert_eq!(compare(&Value::str("10"), &Value::str("9")), Some(Ordering::Greater));
        assert_eq!(compare(&list(&[1]), &Value::Int(5)), Some(Ordering::Greater));
        assert_eq!(compare(&list(&[1, 2]), &list(&[3])), Some(Ordering::Greater));
        assert_eq!(compare(&Value::str("abc"), &Value::Int(5)), Some(Ordering::Greater));
    }

    #[test]
    fn test_nan_is_uncomparable() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(compare(&nan, &Value::Int(1)), None);
        assert!(!loose_eq(&nan, &nan));
        assert_eq!(spaceship(&nan, &Value::Int(1)), 1);
    }

    #[test]
    fn test_spaceship() {
        assert_eq!(spaceship(&Value::Int(1), &Value::Int(2)), -1);
        assert_eq!(spaceship(&Value::str("a"), &Value::str("a")), 0);
        assert_eq!(spaceship(&Value::Float(2.5), &Value::Int(2)), 1);
    }
}
