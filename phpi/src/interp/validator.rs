//! Argument binding for native functions
//!
//! A [`ParamValidator`] describes a native function's parameter list. It
//! checks the argument count, checks or coerces every argument against the
//! declared types, fills in defaults, and collects a variadic tail into an
//! array.

use super::error::{PhpError, PhpResult};
use super::value::{parse_numeric, Array, Numeric, Value};

/// Whether `value` already has one of the declared types
fn matches_type(value: &Value, ty: &str) -> bool {
    match (ty, value) {
        ("mixed", _) => true,
        ("null", Value::Null | Value::Void) => true,
        ("bool", Value::Bool(_)) => true,
        ("false", Value::Bool(false)) => true,
        ("true", Value::Bool(true)) => true,
        ("int", Value::Int(_)) => true,
        ("float", Value::Float(_)) => true,
        ("string", Value::Str(_)) => true,
        ("array" | "iterable", Value::Array(_)) => true,
        ("callable", Value::Str(_) | Value::Array(_)) => true,
        _ => false,
    }
}

/// Scalar juggling applied when no declared type matches exactly
fn coerce_scalar(value: &Value, ty: &str) -> Option<Value> {
    match (ty, value) {
        ("int", Value::Bool(b)) => Some(Value::Int(*b as i64)),
        ("int", Value::Float(f)) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(Value::Int(*f as i64)),
        ("int", Value::Str(s)) => match parse_numeric(s)? {
            Numeric::Int(n) => Some(Value::Int(n)),
            Numeric::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(Value::Int(f as i64)),
            Numeric::Float(_) => None,
        },
        ("float", Value::Bool(b)) => Some(Value::Float(*b as i64 as f64)),
        ("float", Value::Int(n)) => Some(Value::Float(*n as f64)),
        ("float", Value::Str(s)) => parse_numeric(s).map(|n| Value::Float(n.as_f64())),
        ("string", Value::Bool(_) | Value::Int(_) | Value::Float(_)) => {
            Some(Value::Str(value.to_php_string()))
        }
        ("bool", Value::Int(_) | Value::Float(_) | Value::Str(_)) => Some(Value::Bool(value.to_bool())),
        _ => None,
    }
}

/// Accept `value` for a declaration allowing `types`, coercing scalars the
/// way non-strict mode does (int, then float, then string, then bool).
/// `None` means a type error.
pub fn coerce_to<S: AsRef<str>>(value: &Value, types: &[S]) -> Option<Value> {
    if types.is_empty() || types.iter().any(|ty| matches_type(value, ty.as_ref())) {
        return Some(value.clone());
    }
    // int -> float widening is preferred over every other juggling
    if let Value::Int(n) = value {
        if types.iter().any(|ty| ty.as_ref() == "float") {
            return Some(Value::Float(*n as f64));
        }
    }
    ["int", "float", "string", "bool"]
        .iter()
        .filter(|candidate| types.iter().any(|ty| ty.as_ref() == **candidate))
        .find_map(|candidate| coerce_scalar(value, candidate))
}

#[derive(Debug, Clone)]
struct ParamSpec {
    /// Name including the `$` sigil
    name: String,
    types: Vec<&'static str>,
    default: Option<Value>,
    variadic: bool,
}

/// Parameter list of a native function
#[derive(Debug, Clone)]
pub struct ParamValidator {
    function: String,
    params: Vec<ParamSpec>,
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "argument" } else { "arguments" }
}

impl ParamValidator {
    pub fn new(function: &str) -> Self {
        ParamValidator {
            function: function.to_string(),
            params: Vec::new(),
        }
    }

    /// Required parameter
    pub fn param(mut self, name: &str, types: &[&'static str]) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            types: types.to_vec(),
            default: None,
            variadic: false,
        });
        self
    }

    /// Optional parameter; the default's own type is always accepted
    pub fn optional(mut self, name: &str, types: &[&'static str], default: Value) -> Self {
        let mut types = types.to_vec();
        if default.is_null() && !types.contains(&"null") && !types.contains(&"mixed") {
            types.push("null");
        }
        self.params.push(ParamSpec {
            name: name.to_string(),
            types,
            default: Some(default),
            variadic: false,
        });
        self
    }

    /// Trailing `...$name` parameter collecting the remaining arguments
    pub fn variadic(mut self, name: &str, types: &[&'static str]) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            types: types.to_vec(),
            default: None,
            variadic: true,
        });
        self
    }

    fn required(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| p.default.is_none() && !p.variadic)
            .count()
    }

    fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    fn count_error(&self, given: usize) -> PhpError {
        let required = self.required();
        let max = self.params.len();
        let (qualifier, expected) = if given < required {
            let exact = required == max && !self.is_variadic();
            (if exact { "exactly" } else { "at least" }, required)
        } else if required == max {
            ("exactly", max)
        } else {
            ("at most", max)
        };
        PhpError::argument_count(format!(
            "{}() expects {qualifier} {expected} {}, {given} given",
            self.function,
            plural(expected)
        ))
    }

    fn type_error(&self, position: usize, param: &ParamSpec, given: &Value) -> PhpError {
        PhpError::type_error(format!(
            "{}(): Argument #{position} ({}) must be of type {}, {} given",
            self.function,
            param.name,
            param.types.join("|"),
            given.debug_type()
        ))
    }

    /// Bind `args` to the parameter list; the result holds exactly one value
    /// per parameter (the variadic tail as an array)
    pub fn validate(&self, args: Vec<Value>) -> PhpResult<Vec<Value>> {
        let given = args.len();
        if given < self.required() || (!self.is_variadic() && given > self.params.len()) {
            return Err(self.count_error(given));
        }

        let mut args = args.into_iter();
        let mut bound = Vec::with_capacity(self.params.len());
        for (index, param) in self.params.iter().enumerate() {
            if param.variadic {
                let mut rest = Array::new();
                for (offset, arg) in args.by_ref().enumerate() {
                    let value = coerce_to(&arg, &param.types)
                        .ok_or_else(|| self.type_error(index + offset + 1, param, &arg))?;
                    rest.push(value)?;
                }
                bound.push(Value::Array(rest));
                break;
            }
            match args.next() {
                Some(arg) => {
                    let value = coerce_to(&arg, &param.types)
                        .ok_or_else(|| self.type_error(index + 1, param, &arg))?;
                    bound.push(value);
                }
                None => bound.push(param.default.clone().unwrap_or_default()),
            }
        }
        Ok(bound)
    }

    /// [`ParamValidator::validate`] into a fixed-size array, one slot per
    /// parameter
    pub fn bind<const N: usize>(&self, args: Vec<Value>) -> PhpResult<[Value; N]> {
        self.validate(args)?.try_into().map_err(|bound: Vec<Value>| {
            PhpError::error(format!(
                "{}() binds {} parameters into {N} slots",
                self.function,
                bound.len()
            ))
        })
    }
}
