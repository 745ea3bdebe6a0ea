//! Math functions

use super::{Context, NativeFn};
use crate::ast::BinOp;
use crate::interp::compare::compare;
use crate::interp::env::Environment;
use crate::interp::error::{PhpError, PhpResult};
use crate::interp::ops::binary_op;
use crate::interp::validator::ParamValidator;
use crate::interp::value::Value;
use std::cmp::Ordering;

pub fn register(env: &mut Environment) {
    let functions: [(&str, NativeFn); 15] = [
        ("abs", abs),
        ("acos", acos),
        ("acosh", acosh),
        ("asin", asin),
        ("asinh", asinh),
        ("ceil", ceil),
        ("floor", floor),
        ("fmod", fmod),
        ("intdiv", intdiv),
        ("max", max),
        ("min", min),
        ("pi", pi),
        ("pow", pow),
        ("round", round),
        ("sqrt", sqrt),
    ];
    for (name, function) in functions {
        env.register_native(name, function);
    }
}

fn number_arg(name: &str, args: Vec<Value>) -> PhpResult<Value> {
    let [num] = ParamValidator::new(name)
        .param("$num", &["int", "float"])
        .bind(args)?;
    Ok(num)
}

fn float_fn(name: &str, args: Vec<Value>, f: fn(f64) -> f64) -> PhpResult<Value> {
    let [num] = ParamValidator::new(name)
        .param("$num", &["float"])
        .bind(args)?;
    Ok(Value::Float(f(num.to_float())))
}

fn abs(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(match number_arg("abs", args)? {
        Value::Int(n) => match n.checked_abs() {
            Some(n) => Value::Int(n),
            None => Value::Float((n as f64).abs()),
        },
        other => Value::Float(other.to_float().abs()),
    })
}

fn acos(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    float_fn("acos", args, f64::acos)
}

fn acosh(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    float_fn("acosh", args, f64::acosh)
}

fn asin(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    float_fn("asin", args, f64::asin)
}

fn asinh(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    float_fn("asinh", args, f64::asinh)
}

fn sqrt(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    float_fn("sqrt", args, f64::sqrt)
}

fn ceil(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Float(number_arg("ceil", args)?.to_float().ceil()))
}

fn floor(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    Ok(Value::Float(number_arg("floor", args)?.to_float().floor()))
}

fn fmod(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [num1, num2] = ParamValidator::new("fmod")
        .param("$num1", &["float"])
        .param("$num2", &["float"])
        .bind(args)?;
    Ok(Value::Float(num1.to_float() % num2.to_float()))
}

fn intdiv(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [num1, num2] = ParamValidator::new("intdiv")
        .param("$num1", &["int"])
        .param("$num2", &["int"])
        .bind(args)?;
    let (num1, num2) = (num1.to_int(), num2.to_int());
    if num2 == 0 {
        return Err(PhpError::division_by_zero());
    }
    num1.checked_div(num2).map(Value::Int).ok_or_else(|| {
        PhpError::error("Uncaught ArithmeticError: Division of PHP_INT_MIN by -1 is not an integer")
    })
}

fn pi(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    ParamValidator::new("pi").bind::<0>(args)?;
    Ok(Value::Float(std::f64::consts::PI))
}

fn pow(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [num, exponent] = ParamValidator::new("pow")
        .param("$num", &["mixed"])
        .param("$exponent", &["mixed"])
        .bind(args)?;
    let mut warnings = Vec::new();
    let result = binary_op(BinOp::Pow, &num, &exponent, &mut |w| warnings.push(w));
    for warning in warnings {
        ctx.warn(warning);
    }
    result
}

/// Round half away from zero (or per `mode`) after removing binary
/// representation noise from the scaled value
fn round_half(value: f64, places: i64, mode: i64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(places.unsigned_abs().min(308) as i32);
    let scaled = if places >= 0 { value * factor } else { value / factor };
    if !scaled.is_finite() {
        return value;
    }
    let scaled: f64 = format!("{scaled:.15e}").parse().unwrap_or(scaled);
    let floor = scaled.floor();
    let fraction = scaled - floor;
    let rounded = if fraction != 0.5 {
        scaled.round()
    } else {
        match mode {
            2 => {
                if scaled > 0.0 { floor } else { floor + 1.0 }
            }
            3 => {
                if floor % 2.0 == 0.0 { floor } else { floor + 1.0 }
            }
            4 => {
                if floor % 2.0 == 0.0 { floor + 1.0 } else { floor }
            }
            _ => scaled.round(),
        }
    };
    let result = if places >= 0 { rounded / factor } else { rounded * factor };
    if result.is_finite() { result } else { value }
}

fn round(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [num, precision, mode] = ParamValidator::new("round")
        .param("$num", &["int", "float"])
        .optional("$precision", &["int"], Value::Int(0))
        .optional("$mode", &["int"], Value::Int(1))
        .bind(args)?;
    let precision = precision.to_int();
    let mode = mode.to_int();
    if let Value::Int(n) = num {
        if precision >= 0 {
            return Ok(Value::Float(n as f64));
        }
    }
    Ok(Value::Float(round_half(num.to_float(), precision, mode)))
}

/// Shared body of `max` and `min`: `wanted` is the ordering that replaces
/// the current pick
fn extreme(name: &str, args: Vec<Value>, wanted: Ordering) -> PhpResult<Value> {
    let [first, rest] = ParamValidator::new(name)
        .param("$value", &["mixed"])
        .variadic("$values", &["mixed"])
        .bind(args)?;
    let candidates: Vec<Value> = match (first, rest) {
        (Value::Array(array), Value::Array(rest)) if rest.is_empty() => {
            if array.is_empty() {
                return Err(PhpError::error(format!(
                    "Uncaught ValueError: {name}(): Argument #1 ($value) must contain at least one element"
                )));
            }
            array.values().cloned().collect()
        }
        (first, Value::Array(rest)) if !rest.is_empty() => {
            std::iter::once(first).chain(rest.values().cloned()).collect()
        }
        (first, _) => {
            return Err(PhpError::type_error(format!(
                "{name}(): Argument #1 ($value) must be of type array, {} given",
                first.debug_type()
            )));
        }
    };
    let mut candidates = candidates.into_iter();
    let mut best = candidates.next().unwrap_or_default();
    for candidate in candidates {
        if compare(&candidate, &best) == Some(wanted) {
            best = candidate;
        }
    }
    Ok(best)
}

fn max(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    extreme("max", args, Ordering::Greater)
}

fn min(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    extreme("min", args, Ordering::Less)
}
