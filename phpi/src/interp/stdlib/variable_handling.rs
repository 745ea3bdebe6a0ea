//! Type conversion, type inspection and the value dumpers

use super::{Context, NativeFn};
use crate::interp::env::Environment;
use crate::interp::error::{PhpError, PhpResult};
use crate::interp::validator::ParamValidator;
use crate::interp::value::{format_float, parse_numeric, ArrayKey, Value};
use std::fmt::Write;

pub fn register(env: &mut Environment) {
    let functions: [(&str, NativeFn); 24] = [
        ("boolval", boolval),
        ("doubleval", floatval),
        ("floatval", floatval),
        ("get_debug_type", get_debug_type),
        ("gettype", gettype),
        ("intval", intval),
        ("is_array", is_array),
        ("is_bool", is_bool),
        ("is_double", is_float),
        ("is_float", is_float),
        ("is_int", is_int),
        ("is_integer", is_int),
        ("is_long", is_int),
        ("is_null", is_null),
        ("is_numeric", is_numeric),
        ("is_scalar", is_scalar),
        ("is_string", is_string),
        ("print_r", print_r),
        ("strval", strval),
        ("var_dump", var_dump),
        ("var_export", var_export),
        ("is_iterable", is_array),
        ("is_countable", is_array),
        ("is_callable", is_callable),
    ];
    for (name, function) in functions {
        env.register_native(name, function);
    }
}

fn single(name: &str, args: Vec<Value>) -> PhpResult<Value> {
    let [value] = ParamValidator::new(name).param("$value", &["mixed"]).bind(args)?;
    Ok(value)
}

fn boolval(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(single("boolval", args)?.to_bool()))
}

fn floatval(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Float(single("floatval", args)?.to_float()))
}

fn strval(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let value = single("strval", args)?;
    if let Value::Array(_) = value {
        ctx.warn(PhpError::warning("Array to string conversion"));
    }
    Ok(Value::Str(value.to_php_string()))
}

/// `intval($value, $base)`: a base other than 10 only applies to strings
fn intval(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [value, base] = ParamValidator::new("intval")
        .param("$value", &["mixed"])
        .optional("$base", &["int"], Value::Int(10))
        .bind(args)?;
    let base = base.to_int();
    match (&value, base) {
        (Value::Str(s), base) if base != 10 => Ok(Value::Int(parse_int_base(s, base))),
        _ => Ok(Value::Int(value.to_int())),
    }
}

/// Integer prefix of `s` in `base`; base 0 detects `0x`, `0o`, `0b` and `0`
fn parse_int_base(s: &str, base: i64) -> i64 {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let lower = s.to_ascii_lowercase();
    let (radix, digits) = match base {
        0 if lower.starts_with("0x") => (16, &s[2..]),
        0 if lower.starts_with("0o") => (8, &s[2..]),
        0 if lower.starts_with("0b") => (2, &s[2..]),
        0 if lower.starts_with('0') && s.len() > 1 => (8, &s[1..]),
        0 => (10, s),
        16 if lower.starts_with("0x") => (16, &s[2..]),
        8 if lower.starts_with("0o") => (8, &s[2..]),
        2 if lower.starts_with("0b") => (2, &s[2..]),
        base => (base.clamp(2, 36) as u32, s),
    };
    let mut result: i64 = 0;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else { break };
        result = match result.checked_mul(radix as i64).and_then(|r| r.checked_add(digit as i64)) {
            Some(r) => r,
            None => return if negative { i64::MIN } else { i64::MAX },
        };
    }
    if negative { -result } else { result }
}

fn gettype(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::str(single("gettype", args)?.type_name()))
}

fn get_debug_type(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let value = single("get_debug_type", args)?;
    Ok(Value::str(if value.is_null() { "null" } else { value.debug_type() }))
}

fn is_array(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(matches!(single("is_array", args)?, Value::Array(_))))
}

fn is_bool(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(matches!(single("is_bool", args)?, Value::Bool(_))))
}

fn is_float(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(matches!(single("is_float", args)?, Value::Float(_))))
}

fn is_int(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(matches!(single("is_int", args)?, Value::Int(_))))
}

fn is_null(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(single("is_null", args)?.is_null()))
}

fn is_string(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(matches!(single("is_string", args)?, Value::Str(_))))
}

fn is_scalar(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(single("is_scalar", args)?.is_scalar()))
}

fn is_numeric(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(match single("is_numeric", args)? {
        Value::Int(_) | Value::Float(_) => true,
        Value::Str(s) => parse_numeric(&s).is_some(),
        _ => false,
    }))
}

/// Names a native or user function
fn is_callable(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Bool(match single("is_callable", args)? {
        Value::Str(name) => ctx.env().borrow().function_exists(&name),
        _ => false,
    }))
}

// ------------------------------------------------------------ Dumpers

fn dump_key(key: &ArrayKey) -> String {
    match key {
        ArrayKey::Int(n) => format!("[{n}]"),
        ArrayKey::Str(s) => format!("[\"{s}\"]"),
    }
}

fn var_dump_value(out: &mut String, value: &Value, indent: usize) {
    let pad = " ".repeat(indent);
    match value {
        Value::Void | Value::Null => out.push_str("NULL\n"),
        Value::Bool(b) => {
            let _ = writeln!(out, "bool({b})");
        }
        Value::Int(n) => {
            let _ = writeln!(out, "int({n})");
        }
        Value::Float(f) => {
            let _ = writeln!(out, "float({})", format_float(*f, None));
        }
        Value::Str(s) => {
            let _ = writeln!(out, "string({}) \"{s}\"", s.len());
        }
        Value::Array(array) => {
            let _ = writeln!(out, "array({}) {{", array.len());
            for (key, element) in array.iter() {
                let _ = writeln!(out, "{pad}  {}=>", dump_key(key));
                out.push_str(&pad);
                out.push_str("  ");
                var_dump_value(out, element, indent + 2);
            }
            let _ = writeln!(out, "{pad}}}");
        }
    }
}

fn var_dump(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [value, Value::Array(rest)] = ParamValidator::new("var_dump")
        .param("$value", &["mixed"])
        .variadic("$values", &["mixed"])
        .bind(args)?
    else {
        return Ok(Value::Null);
    };
    let mut out = String::new();
    var_dump_value(&mut out, &value, 0);
    for value in rest.values() {
        var_dump_value(&mut out, value, 0);
    }
    ctx.print(&out);
    Ok(Value::Null)
}

fn print_r_value(out: &mut String, value: &Value, indent: usize) {
    match value {
        Value::Array(array) => {
            let pad = " ".repeat(indent);
            let _ = write!(out, "Array\n{pad}(\n");
            for (key, element) in array.iter() {
                let _ = write!(out, "{pad}    [{key}] => ");
                print_r_value(out, element, indent + 8);
                out.push('\n');
            }
            let _ = writeln!(out, "{pad})");
        }
        scalar => out.push_str(&scalar.to_php_string()),
    }
}

fn print_r(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [value, return_output] = ParamValidator::new("print_r")
        .param("$value", &["mixed"])
        .optional("$return", &["bool"], Value::Bool(false))
        .bind(args)?;
    let mut out = String::new();
    print_r_value(&mut out, &value, 0);
    if return_output.to_bool() {
        return Ok(Value::Str(out));
    }
    ctx.print(&out);
    Ok(Value::Bool(true))
}

fn export_string(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn var_export_value(out: &mut String, value: &Value, indent: usize) {
    match value {
        Value::Void | Value::Null => out.push_str("NULL"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float(f) => {
            let text = format_float(*f, None);
            let integral = text.bytes().all(|b| b.is_ascii_digit() || b == b'-');
            out.push_str(&text);
            if integral {
                out.push_str(".0");
            }
        }
        Value::Str(s) => out.push_str(&export_string(s)),
        Value::Array(array) => {
            let pad = " ".repeat(indent);
            out.push_str("array (\n");
            for (key, element) in array.iter() {
                let key = match key {
                    ArrayKey::Int(n) => n.to_string(),
                    ArrayKey::Str(s) => export_string(s),
                };
                let _ = write!(out, "{pad}  {key} => ");
                if let Value::Array(_) = element {
                    let _ = write!(out, "\n{pad}  ");
                }
                var_export_value(out, element, indent + 2);
                out.push_str(",\n");
            }
            let _ = write!(out, "{pad})");
        }
    }
}

fn var_export(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [value, return_output] = ParamValidator::new("var_export")
        .param("$value", &["mixed"])
        .optional("$return", &["bool"], Value::Bool(false))
        .bind(args)?;
    let mut out = String::new();
    var_export_value(&mut out, &value, 0);
    if return_output.to_bool() {
        return Ok(Value::Str(out));
    }
    ctx.print(&out);
    Ok(Value::Null)
}
