//! Array and string offsets: reads, quiet reads and writes through a path of
//! subscripts
//!
//! Non-fatal diagnostics are collected into a `Vec` so callers can report
//! them once the variable storage is no longer borrowed.

use super::error::{PhpError, PhpResult, MEMORY_LIMIT};
use super::value::{float_to_int, parse_numeric, Array, ArrayKey, Numeric, Value};

fn undefined_key(key: &ArrayKey) -> PhpError {
    match key {
        ArrayKey::Int(n) => PhpError::warning(format!("Undefined array key {n}")),
        ArrayKey::Str(s) => PhpError::warning(format!("Undefined array key \"{s}\"")),
    }
}

fn null_type_name(value: &Value) -> &'static str {
    if value.is_null() { "null" } else { value.debug_type() }
}

/// Integer position addressed by a string offset
fn string_index(key: &Value, warnings: &mut Vec<PhpError>) -> PhpResult<i64> {
    match key {
        Value::Int(n) => Ok(*n),
        Value::Str(s) => match parse_numeric(s) {
            Some(Numeric::Int(n)) => Ok(n),
            _ => Err(PhpError::type_error(format!(
                "Cannot access offset of type {} on string",
                key.debug_type()
            ))),
        },
        Value::Float(f) => {
            warnings.push(PhpError::warning("String offset cast occurred"));
            Ok(float_to_int(*f))
        }
        Value::Bool(_) | Value::Null | Value::Void => {
            warnings.push(PhpError::warning("String offset cast occurred"));
            Ok(key.to_int())
        }
        Value::Array(_) => Err(PhpError::type_error("Cannot access offset of type array on string")),
    }
}

/// Byte position of `index` within a string of `len` bytes; negative indexes
/// count from the end
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let pos = if index < 0 { len + index } else { index };
    (0..len).contains(&pos).then_some(pos as usize)
}

fn byte_string(byte: u8) -> Value {
    Value::Str(String::from_utf8_lossy(&[byte]).into_owned())
}

/// `$container[$key]` for a single subscript
pub fn read_offset(container: &Value, key: &Value, warnings: &mut Vec<PhpError>) -> PhpResult<Value> {
    match container {
        Value::Array(_) => read_path(container, std::slice::from_ref(key), warnings),
        Value::Str(s) => {
            let index = string_index(key, warnings)?;
            match resolve_index(index, s.len()) {
                Some(pos) => Ok(byte_string(s.as_bytes()[pos])),
                None => {
                    warnings.push(PhpError::warning(format!("Uninitialized string offset {index}")));
                    Ok(Value::str(""))
                }
            }
        }
        other => {
            warnings.push(PhpError::warning(format!(
                "Trying to access array offset on value of type {}",
                null_type_name(other)
            )));
            Ok(Value::Null)
        }
    }
}

/// Follow `keys` from `root`, copying only the value reached
pub fn read_path(root: &Value, keys: &[Value], warnings: &mut Vec<PhpError>) -> PhpResult<Value> {
    let Some((key, rest)) = keys.split_first() else {
        return Ok(root.clone());
    };
    if let Value::Array(array) = root {
        let key = ArrayKey::from_value(key)?;
        return match array.get(&key) {
            Some(inner) => read_path(inner, rest, warnings),
            None => {
                warnings.push(undefined_key(&key));
                read_path(&Value::Null, rest, warnings)
            }
        };
    }
    let value = read_offset(root, key, warnings)?;
    read_path(&value, rest, warnings)
}

/// Like [`read_path`] but silent; `None` when any step is missing
pub fn quiet_path(root: &Value, keys: &[Value]) -> Option<Value> {
    let Some((key, rest)) = keys.split_first() else {
        return Some(root.clone());
    };
    match root {
        Value::Array(array) => {
            let key = ArrayKey::from_value(key).ok()?;
            quiet_path(array.get(&key)?, rest)
        }
        Value::Str(s) => {
            let index = match key {
                Value::Int(n) => *n,
                Value::Str(k) => match parse_numeric(k)? {
                    Numeric::Int(n) => n,
                    Numeric::Float(_) => return None,
                },
                Value::Float(f) => float_to_int(*f),
                Value::Bool(b) => *b as i64,
                _ => return None,
            };
            let pos = resolve_index(index, s.len())?;
            quiet_path(&byte_string(s.as_bytes()[pos]), rest)
        }
        _ => None,
    }
}

/// Store `value` at the end of `keys` below `slot`; a `None` key appends
pub fn write_path(
    slot: &mut Value,
    keys: &[Option<Value>],
    value: Value,
    warnings: &mut Vec<PhpError>,
) -> PhpResult<()> {
    let Some((key, rest)) = keys.split_first() else {
        *slot = value;
        return Ok(());
    };
    match slot {
        Value::Void | Value::Null => *slot = Value::Array(Array::new()),
        Value::Bool(false) => {
            warnings.push(PhpError::deprecated("Automatic conversion of false to array is deprecated"));
            *slot = Value::Array(Array::new());
        }
        _ => {}
    }
    match slot {
        Value::Array(array) => {
            let key = match key {
                Some(key) => ArrayKey::from_value(key)?,
                None => match array.next_index() {
                    Ok(index) => ArrayKey::Int(index),
                    Err(warning) => {
                        warnings.push(warning);
                        return Ok(());
                    }
                },
            };
            if rest.is_empty() {
                array.insert(key, value);
                return Ok(());
            }
            write_path(array.entry_or_null(key), rest, value, warnings)
        }
        Value::Str(s) => {
            if !rest.is_empty() {
                return Err(PhpError::error("Uncaught Error: Cannot use string offset as an array"));
            }
            let Some(key) = key else {
                return Err(PhpError::error("Uncaught Error: [] operator not supported for strings"));
            };
            write_string_offset(s, key, &value, warnings)
        }
        _ => Err(PhpError::error("Uncaught Error: Cannot use a scalar value as an array")),
    }
}

fn write_string_offset(
    s: &mut String,
    key: &Value,
    value: &Value,
    warnings: &mut Vec<PhpError>,
) -> PhpResult<()> {
    let index = string_index(key, warnings)?;
    let replacement = value.to_php_string();
    let Some(&byte) = replacement.as_bytes().first() else {
        return Err(PhpError::error(
            "Uncaught Error: Cannot assign an empty string to a string offset",
        ));
    };
    if replacement.len() > 1 {
        warnings.push(PhpError::warning("Only the first byte will be assigned to the string offset"));
    }

    let pos = if index < 0 {
        let pos = s.len() as i64 + index;
        if pos < 0 {
            warnings.push(PhpError::warning(format!("Illegal string offset {index}")));
            return Ok(());
        }
        pos as usize
    } else {
        index as usize
    };
    if pos >= MEMORY_LIMIT {
        return Err(PhpError::memory_exhausted(pos as u64 + 1));
    }

    let mut bytes = std::mem::take(s).into_bytes();
    if pos >= bytes.len() {
        bytes.resize(pos + 1, b' ');
    }
    bytes[pos] = byte;
    *s = String::from_utf8_lossy(&bytes).into_owned();
    Ok(())
}

/// Remove the entry at the end of `keys`; missing steps are ignored
pub fn unset_path(slot: &mut Value, keys: &[Value]) -> PhpResult<()> {
    let Some((key, rest)) = keys.split_first() else {
        return Ok(());
    };
    match slot {
        Value::Array(array) => {
            let key = ArrayKey::from_value(key)?;
            if rest.is_empty() {
                array.remove(&key);
                return Ok(());
            }
            match array.get_mut(&key) {
                Some(inner) => unset_path(inner, rest),
                None => Ok(()),
            }
        }
        Value::Str(_) if rest.is_empty() => {
            Err(PhpError::error("Uncaught Error: Cannot unset string offsets"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[i64]) -> Value {
        Value::Array(Array::from_list(values.iter().map(|n| Value::Int(*n))))
    }

    #[test]
    fn test_read_nested() {
        let inner = list(&[10, 20]);
        let outer = Value::Array(Array::from_list([inner]));
        let mut warnings = Vec::new();
        let value = read_path(&outer, &[Value::Int(0), Value::str("1")], &mut warnings).unwrap();
        assert_eq!(value, Value::Int(20));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_read_missing_key_warns() {
        let mut warnings = Vec::new();
        let value = read_path(&list(&[1]), &[Value::str("name")], &mut warnings).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(warnings[0].message(), "Undefined array key \"name\"");

        let mut warnings = Vec::new();
        read_path(&list(&[1]), &[Value::Int(5), Value::Int(0)], &mut warnings).unwrap();
        assert_eq!(warnings[0].message(), "Undefined array key 5");
        assert_eq!(
            warnings[1].message(),
            "Trying to access array offset on value of type null"
        );
    }

    #[test]
    fn test_string_offsets() {
        let s = Value::str("abc");
        let mut warnings = Vec::new();
        assert_eq!(read_offset(&s, &Value::Int(-1), &mut warnings).unwrap(), Value::str("c"));
        assert_eq!(read_offset(&s, &Value::Int(3), &mut warnings).unwrap(), Value::str(""));
        assert_eq!(warnings[0].message(), "Uninitialized string offset 3");
        assert!(read_offset(&s, &Value::str("x"), &mut warnings).is_err());
    }

    #[test]
    fn test_quiet_path() {
        let value = list(&[1, 2]);
        assert_eq!(quiet_path(&value, &[Value::Int(1)]), Some(Value::Int(2)));
        assert_eq!(quiet_path(&value, &[Value::Int(9)]), None);
        assert_eq!(quiet_path(&Value::Int(3), &[Value::Int(0)]), None);
        assert_eq!(quiet_path(&Value::str("hi"), &[Value::Int(0)]), Some(Value::str("h")));
    }

    #[test]
    fn test_write_autovivifies() {
        let mut slot = Value::Null;
        let mut warnings = Vec::new();
        write_path(&mut slot, &[Some(Value::str("a")), None], Value::Int(1), &mut warnings).unwrap();
        write_path(&mut slot, &[Some(Value::str("a")), None], Value::Int(2), &mut warnings).unwrap();
        let expected: Array = [(ArrayKey::from("a"), list(&[1, 2]))].into_iter().collect();
        assert_eq!(slot, Value::Array(expected));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_write_false_is_deprecated() {
        let mut slot = Value::Bool(false);
        let mut warnings = Vec::new();
        write_path(&mut slot, &[None], Value::Int(1), &mut warnings).unwrap();
        assert_eq!(slot, list(&[1]));
        assert_eq!(warnings[0].message(), "Automatic conversion of false to array is deprecated");
    }

    #[test]
    fn test_write_scalar_is_fatal() {
        let mut slot = Value::Int(1);
        let err = write_path(&mut slot, &[Some(Value::Int(0))], Value::Int(1), &mut Vec::new()).unwrap_err();
        assert_eq!(err.message(), "Uncaught Error: Cannot use a scalar value as an array");
    }

    #[test]
    fn test_write_string_offset() {
        let mut slot = Value::str("abc");
        let mut warnings = Vec::new();
        write_path(&mut slot, &[Some(Value::Int(1))], Value::str("X"), &mut warnings).unwrap();
        assert_eq!(slot, Value::str("aXc"));
        write_path(&mut slot, &[Some(Value::Int(5))], Value::str("!"), &mut warnings).unwrap();
        assert_eq!(slot, Value::str("aXc  !"));

        let err = write_path(&mut slot, &[Some(Value::Int(0))], Value::str(""), &mut warnings).unwrap_err();
        assert_eq!(err.message(), "Uncaught Error: Cannot assign an empty string to a string offset");
        let err = write_path(&mut slot, &[None], Value::str("a"), &mut warnings).unwrap_err();
        assert_eq!(err.message(), "Uncaught Error: [] operator not supported for strings");
    }

    #[test]
    fn test_huge_string_offset_exhausts_memory() {
        let mut slot = Value::str("a");
        let mut warnings = Vec::new();
        let err = write_path(&mut slot, &[Some(Value::Int(i64::MAX))], Value::str("b"), &mut warnings)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(
            err.message(),
            "Allowed memory size of 134217728 bytes exhausted (tried to allocate 9223372036854775808 bytes)"
        );
        assert_eq!(slot, Value::str("a"));
    }

    #[test]
    fn test_unset_path() {
        let mut slot = Value::Array(Array::from_list([list(&[1, 2])]));
        unset_path(&mut slot, &[Value::Int(0), Value::Int(0)]).unwrap();
        unset_path(&mut slot, &[Value::Int(7), Value::Int(0)]).unwrap();
        let Value::Array(outer) = &slot else { panic!("not an array") };
        let inner = outer.get(&ArrayKey::Int(0)).unwrap();
        let Value::Array(inner) = inner else { panic!("not an array") };
        assert_eq!(inner.len(), 1);
        assert_eq!(inner.get(&ArrayKey::Int(1)), Some(&Value::Int(2)));
    }
}
