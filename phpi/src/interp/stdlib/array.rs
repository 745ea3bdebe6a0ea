//! Array functions

use super::{Context, NativeFn};
use crate::interp::compare::loose_eq;
use crate::interp::env::Environment;
use crate::interp::error::{PhpError, PhpResult};
use crate::interp::validator::ParamValidator;
use crate::interp::value::{Array, ArrayKey, Numeric, Value};

/// Functions whose `$array` argument is passed by reference
pub const BY_REFERENCE: &[&str] = &["array_pop", "array_push"];

pub fn register(env: &mut Environment) {
    let functions: [(&str, NativeFn); 12] = [
        ("array_key_exists", array_key_exists),
        ("key_exists", array_key_exists),
        ("array_key_first", array_key_first),
        ("array_key_last", array_key_last),
        ("array_keys", array_keys),
        ("array_pop", array_pop),
        ("array_push", array_push),
        ("array_sum", array_sum),
        ("array_values", array_values),
        ("count", count),
        ("sizeof", count),
        ("in_array", in_array),
    ];
    for (name, function) in functions {
        env.register_native(name, function);
    }
}

fn into_array(value: Value) -> Array {
    match value {
        Value::Array(array) => array,
        _ => Array::new(),
    }
}

fn array_key_exists(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [key, array] = ParamValidator::new("array_key_exists")
        .param("$key", &["string", "int", "float", "bool", "null"])
        .param("$array", &["array"])
        .bind(args)?;
    let key = ArrayKey::from_value(&key)?;
    Ok(Value::Bool(into_array(array).contains_key(&key)))
}

fn array_key_first(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [array] = ParamValidator::new("array_key_first")
        .param("$array", &["array"])
        .bind(args)?;
    let array = into_array(array);
    Ok(array.keys().next().map_or(Value::Null, ArrayKey::to_value))
}

fn array_key_last(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [array] = ParamValidator::new("array_key_last")
        .param("$array", &["array"])
        .bind(args)?;
    let array = into_array(array);
    Ok(array.keys().last().map_or(Value::Null, ArrayKey::to_value))
}

/// `array_push(&$array, ...$values)`: the new element count
fn array_push(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [array, values] = ParamValidator::new("array_push")
        .param("$array", &["array"])
        .variadic("$values", &["mixed"])
        .bind(args)?;
    let mut array = into_array(array);
    for value in into_array(values).values().cloned() {
        if let Err(warning) = array.push(value) {
            ctx.warn(warning);
            return Ok(Value::Bool(false));
        }
    }
    let count = array.len() as i64;
    ctx.set_reference(Value::Array(array));
    Ok(Value::Int(count))
}

/// `array_pop(&$array)`: the removed last value, `null` when empty
fn array_pop(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [array] = ParamValidator::new("array_pop")
        .param("$array", &["array"])
        .bind(args)?;
    let mut array = into_array(array);
    let last = array.keys().last().cloned();
    let popped = last.and_then(|key| array.remove(&key)).unwrap_or(Value::Null);
    ctx.set_reference(Value::Array(array));
    Ok(popped)
}

/// `array_keys($array, $filter_value, $strict)`
fn array_keys(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let given = args.len();
    let [array, filter, strict] = ParamValidator::new("array_keys")
        .param("$array", &["array"])
        .optional("$filter_value", &["mixed"], Value::Null)
        .optional("$strict", &["bool"], Value::Bool(false))
        .bind(args)?;
    let strict = strict.to_bool();
    let array = into_array(array);
    let keys = array
        .iter()
        .filter(|(_, value)| given < 2 || matches(value, &filter, strict))
        .map(|(key, _)| key.to_value());
    Ok(Value::Array(Array::from_list(keys)))
}

fn array_values(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [array] = ParamValidator::new("array_values")
        .param("$array", &["array"])
        .bind(args)?;
    Ok(Value::Array(Array::from_list(into_array(array).values().cloned())))
}

fn count(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [value, mode] = ParamValidator::new("count")
        .param("$value", &["array"])
        .optional("$mode", &["int"], Value::Int(0))
        .bind(args)?;
    let array = into_array(value);
    Ok(Value::Int(if mode.to_int() == 1 {
        recursive_count(&array)
    } else {
        array.len() as i64
    }))
}

fn recursive_count(array: &Array) -> i64 {
    array
        .values()
        .map(|value| match value {
            Value::Array(inner) => 1 + recursive_count(inner),
            _ => 1,
        })
        .sum()
}

fn matches(value: &Value, needle: &Value, strict: bool) -> bool {
    if strict {
        value.identical(needle)
    } else {
        loose_eq(value, needle)
    }
}

fn in_array(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [needle, haystack, strict] = ParamValidator::new("in_array")
        .param("$needle", &["mixed"])
        .param("$haystack", &["array"])
        .optional("$strict", &["bool"], Value::Bool(false))
        .bind(args)?;
    let strict = strict.to_bool();
    let found = into_array(haystack)
        .values()
        .any(|value| matches(value, &needle, strict));
    Ok(Value::Bool(found))
}

fn array_sum(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [array] = ParamValidator::new("array_sum")
        .param("$array", &["array"])
        .bind(args)?;
    let mut sum = Numeric::Int(0);
    for value in into_array(array).values() {
        let term = match value {
            Value::Array(_) => {
                ctx.warn(PhpError::warning("array_sum(): Addition is not supported on type array"));
                continue;
            }
            other => other.to_number(),
        };
        sum = match (sum, term) {
            (Numeric::Int(a), Numeric::Int(b)) => match a.checked_add(b) {
                Some(n) => Numeric::Int(n),
                None => Numeric::Float(a as f64 + b as f64),
            },
            (a, b) => Numeric::Float(a.as_f64() + b.as_f64()),
        };
    }
    Ok(sum.to_value())
}
