//! Operator semantics: arithmetic, bitwise, concatenation, comparison,
//! unary operators and increment/decrement
//!
//! Non-fatal diagnostics raised while converting operands are handed to the
//! `warn` sink; fatal ones are returned as errors.

use super::compare::{compare, loose_eq, spaceship};
use super::error::{PhpError, PhpResult};
use super::value::{float_to_int, parse_leading_numeric, parse_numeric, Numeric, Value};
use crate::ast::{BinOp, IncDecOp, UnOp};
use std::cmp::Ordering;

/// Sink for non-fatal diagnostics
pub type Warn<'a> = dyn FnMut(PhpError) + 'a;

fn unsupported(left: &Value, op: BinOp, right: &Value) -> PhpError {
    PhpError::type_error(format!(
        "Unsupported operand types: {} {op} {}",
        left.debug_type(),
        right.debug_type()
    ))
}

/// String conversion for output and concatenation; arrays warn
pub fn stringify(value: &Value, warn: &mut Warn<'_>) -> String {
    if let Value::Array(_) = value {
        warn(PhpError::warning("Array to string conversion"));
    }
    value.to_php_string()
}

/// Numeric view of a string operand; non-numeric text warns and counts as
/// its leading number (0 when there is none)
fn string_number(s: &str, warn: &mut Warn<'_>) -> Numeric {
    match parse_numeric(s) {
        Some(n) => n,
        None => {
            warn(PhpError::warning("A non-numeric value encountered"));
            parse_leading_numeric(s)
        }
    }
}

fn operand(value: &Value, warn: &mut Warn<'_>) -> Numeric {
    match value {
        Value::Str(s) => string_number(s, warn),
        other => other.to_number(),
    }
}

/// Convert both operands of an arithmetic or bitwise operator
fn operands(
    left: &Value,
    op: BinOp,
    right: &Value,
    warn: &mut Warn<'_>,
) -> PhpResult<(Numeric, Numeric)> {
    if matches!(left, Value::Array(_)) || matches!(right, Value::Array(_)) {
        return Err(unsupported(left, op, right));
    }
    Ok((operand(left, warn), operand(right, warn)))
}

fn int_or_float(checked: Option<i64>, fallback: impl FnOnce() -> f64) -> Value {
    match checked {
        Some(n) => Value::Int(n),
        None => Value::Float(fallback()),
    }
}

fn add(a: Numeric, b: Numeric) -> Value {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => int_or_float(x.checked_add(y), || x as f64 + y as f64),
        (x, y) => Value::Float(x.as_f64() + y.as_f64()),
    }
}

fn sub(a: Numeric, b: Numeric) -> Value {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => int_or_float(x.checked_sub(y), || x as f64 - y as f64),
        (x, y) => Value::Float(x.as_f64() - y.as_f64()),
    }
}

fn mul(a: Numeric, b: Numeric) -> Value {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => int_or_float(x.checked_mul(y), || x as f64 * y as f64),
        (x, y) => Value::Float(x.as_f64() * y.as_f64()),
    }
}

fn div(a: Numeric, b: Numeric) -> PhpResult<Value> {
    if b.as_f64() == 0.0 {
        return Err(PhpError::division_by_zero());
    }
    Ok(match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) if x.checked_rem(y) == Some(0) => {
            int_or_float(x.checked_div(y), || x as f64 / y as f64)
        }
        (x, y) => Value::Float(x.as_f64() / y.as_f64()),
    })
}

fn modulo(a: Numeric, b: Numeric) -> PhpResult<Value> {
    let x = numeric_to_int(a);
    let y = numeric_to_int(b);
    if y == 0 {
        return Err(PhpError::modulo_by_zero());
    }
    Ok(Value::Int(x.wrapping_rem(y)))
}

fn pow(a: Numeric, b: Numeric) -> Value {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) if y >= 0 => {
            let checked = u32::try_from(y).ok().and_then(|e| x.checked_pow(e));
            int_or_float(checked, || (x as f64).powf(y as f64))
        }
        (x, y) => Value::Float(x.as_f64().powf(y.as_f64())),
    }
}

fn numeric_to_int(n: Numeric) -> i64 {
    match n {
        Numeric::Int(i) => i,
        Numeric::Float(f) => float_to_int(f),
    }
}

fn shift(op: BinOp, a: i64, b: i64) -> PhpResult<Value> {
    if b < 0 {
        return Err(PhpError::error("Uncaught ArithmeticError: Bit shift by negative number"));
    }
    let result = match op {
        BinOp::Shl if b >= 64 => 0,
        BinOp::Shl => a.wrapping_shl(b as u32),
        _ if b >= 64 => {
            if a < 0 { -1 } else { 0 }
        }
        _ => a >> b,
    };
    Ok(Value::Int(result))
}

/// Apply a binary operator to already evaluated operands. `&&`/`||` are
/// short-circuited by the evaluator; here they are plain boolean operators.
pub fn binary_op(op: BinOp, left: &Value, right: &Value, warn: &mut Warn<'_>) -> PhpResult<Value> {
    match op {
        BinOp::Add => {
            if let (Value::Array(a), Value::Array(b)) = (left, right) {
                let mut union = a.clone();
                for (key, value) in b.iter() {
                    if !union.contains_key(key) {
                        union.insert(key.clone(), value.clone());
                    }
                }
                return Ok(Value::Array(union));
            }
            let (a, b) = operands(left, op, right, warn)?;
            Ok(add(a, b))
        }
        BinOp::Sub => {
            let (a, b) = operands(left, op, right, warn)?;
            Ok(sub(a, b))
        }
        BinOp::Mul => {
            let (a, b) = operands(left, op, right, warn)?;
            Ok(mul(a, b))
        }
        BinOp::Div => {
            let (a, b) = operands(left, op, right, warn)?;
            div(a, b)
        }
        BinOp::Mod => {
            let (a, b) = operands(left, op, right, warn)?;
            modulo(a, b)
        }
        BinOp::Pow => {
            let (a, b) = operands(left, op, right, warn)?;
            Ok(pow(a, b))
        }
        BinOp::Concat => {
            let mut text = stringify(left, warn);
            text.push_str(&stringify(right, warn));
            Ok(Value::Str(text))
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
            let (a, b) = operands(left, op, right, warn)?;
            let (x, y) = (numeric_to_int(a), numeric_to_int(b));
            match op {
                BinOp::BitAnd => Ok(Value::Int(x & y)),
                BinOp::BitOr => Ok(Value::Int(x | y)),
                BinOp::BitXor => Ok(Value::Int(x ^ y)),
                _ => shift(op, x, y),
            }
        }
        BinOp::And => Ok(Value::Bool(left.to_bool() && right.to_bool())),
        BinOp::Or => Ok(Value::Bool(left.to_bool() || right.to_bool())),
        BinOp::Xor => Ok(Value::Bool(left.to_bool() ^ right.to_bool())),
        BinOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinOp::Ne => Ok(Value::Bool(!loose_eq(left, right))),
        BinOp::Identical => Ok(Value::Bool(left.identical(right))),
        BinOp::NotIdentical => Ok(Value::Bool(!left.identical(right))),
        BinOp::Lt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Less))),
        BinOp::Le => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinOp::Gt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Greater))),
        BinOp::Ge => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        BinOp::Spaceship => Ok(Value::Int(spaceship(left, right))),
    }
}

/// Apply `!`, unary `+`/`-` or `~`
pub fn unary_op(op: UnOp, value: &Value, warn: &mut Warn<'_>) -> PhpResult<Value> {
    match op {
        UnOp::Not => Ok(Value::Bool(!value.to_bool())),
        UnOp::Plus | UnOp::Neg => {
            if let Value::Array(_) = value {
                return Err(unsupported(value, BinOp::Mul, &Value::Int(1)));
            }
            let n = operand(value, warn);
            Ok(match (op, n) {
                (UnOp::Plus, n) => n.to_value(),
                (_, Numeric::Int(i)) => int_or_float(i.checked_neg(), || -(i as f64)),
                (_, Numeric::Float(f)) => Value::Float(-f),
            })
        }
        UnOp::BitNot => match value {
            Value::Int(n) => Ok(Value::Int(!n)),
            Value::Float(f) => Ok(Value::Int(!float_to_int(*f))),
            Value::Str(s) => {
                let bytes: Vec<u8> = s.bytes().map(|b| !b).collect();
                Ok(Value::Str(String::from_utf8_lossy(&bytes).into_owned()))
            }
            other => Err(PhpError::type_error(format!(
                "Cannot perform bitwise not on {}",
                other.debug_type()
            ))),
        },
    }
}

/// Perl-style increment of an alphanumeric string (`"Az"` becomes `"Ba"`,
/// `"zz"` becomes `"aaa"`); scanning stops at the first non-alphanumeric byte
fn increment_string(s: &str) -> String {
    let mut bytes = s.as_bytes().to_vec();
    let mut carry = false;
    let mut first_kind = b'1';
    for pos in (0..bytes.len()).rev() {
        let (wrap_from, wrap_to) = match bytes[pos] {
            b'a'..=b'z' => (b'z', b'a'),
            b'A'..=b'Z' => (b'Z', b'A'),
            b'0'..=b'9' => (b'9', b'0'),
            _ => {
                carry = false;
                break;
            }
        };
        first_kind = if wrap_to == b'0' { b'1' } else { wrap_to };
        if bytes[pos] == wrap_from {
            bytes[pos] = wrap_to;
            carry = true;
        } else {
            bytes[pos] += 1;
            carry = false;
            break;
        }
    }
    if carry {
        bytes.insert(0, first_kind);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// New value of an operand after `++` or `--`
pub fn inc_dec(op: IncDecOp, value: &Value) -> PhpResult<Value> {
    let step = |n: Numeric| match (op, n) {
        (IncDecOp::Inc, Numeric::Int(i)) => int_or_float(i.checked_add(1), || i as f64 + 1.0),
        (IncDecOp::Dec, Numeric::Int(i)) => int_or_float(i.checked_sub(1), || i as f64 - 1.0),
        (IncDecOp::Inc, Numeric::Float(f)) => Value::Float(f + 1.0),
        (IncDecOp::Dec, Numeric::Float(f)) => Value::Float(f - 1.0),
    };
    match value {
        Value::Void | Value::Null => Ok(match op {
            IncDecOp::Inc => Value::Int(1),
            IncDecOp::Dec => Value::Null,
        }),
        Value::Bool(_) => Ok(value.clone()),
        Value::Int(n) => Ok(step(Numeric::Int(*n))),
        Value::Float(f) => Ok(step(Numeric::Float(*f))),
        Value::Str(s) if s.is_empty() => Ok(match op {
            IncDecOp::Inc => Value::str("1"),
            IncDecOp::Dec => Value::Int(-1),
        }),
        Value::Str(s) => Ok(match (parse_numeric(s), op) {
            (Some(n), _) => step(n),
            (None, IncDecOp::Inc) => Value::Str(increment_string(s)),
            (None, IncDecOp::Dec) => value.clone(),
        }),
        Value::Array(_) => {
            let verb = match op {
                IncDecOp::Inc => "increment",
                IncDecOp::Dec => "decrement",
            };
            Err(PhpError::type_error(format!("Cannot {verb} array")))
        }
    }
}
