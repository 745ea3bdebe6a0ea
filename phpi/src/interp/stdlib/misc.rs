//! Constants, error reporting and runtime options

use super::{Context, NativeFn};
use crate::interp::env::Environment;
use crate::interp::error::{PhpError, PhpResult};
use crate::interp::predefined::PHP_VERSION;
use crate::interp::validator::ParamValidator;
use crate::interp::value::{ArrayKey, Value};
use tracing::debug;

pub fn register(env: &mut Environment) {
    let functions: [(&str, NativeFn); 9] = [
        ("constant", constant),
        ("define", define),
        ("defined", defined),
        ("error_reporting", error_reporting),
        ("function_exists", function_exists),
        ("getenv", getenv),
        ("ini_get", ini_get),
        ("ini_set", ini_set),
        ("phpversion", phpversion),
    ];
    for (name, function) in functions {
        env.register_native(name, function);
    }
}

fn constant(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [name] = ParamValidator::new("constant")
        .param("$name", &["string"])
        .bind(args)?;
    let name = name.to_php_string();
    let value = ctx.env().borrow().lookup_constant(&name);
    value.ok_or_else(|| PhpError::undefined_constant(&name))
}

fn define(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [name, value, _case_insensitive] = ParamValidator::new("define")
        .param("$constant_name", &["string"])
        .param("$value", &["mixed"])
        .optional("$case_insensitive", &["bool"], Value::Bool(false))
        .bind(args)?;
    let name = name.to_php_string();
    let result = ctx.env().borrow_mut().declare_constant(&name, value);
    match result {
        Ok(()) => Ok(Value::Bool(true)),
        Err(err) => {
            ctx.warn(err);
            Ok(Value::Bool(false))
        }
    }
}

fn defined(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [name] = ParamValidator::new("defined")
        .param("$constant_name", &["string"])
        .bind(args)?;
    let found = ctx.env().borrow().lookup_constant(&name.to_php_string()).is_some();
    Ok(Value::Bool(found))
}

/// Extensions that report the interpreter version
const EXTENSIONS: &[&str] = &["core", "date", "standard"];

fn phpversion(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [extension] = ParamValidator::new("phpversion")
        .optional("$extension", &["string"], Value::Null)
        .bind(args)?;
    let known = match extension {
        Value::Null => true,
        extension => {
            let extension = extension.to_php_string();
            EXTENSIONS.iter().any(|name| name.eq_ignore_ascii_case(&extension))
        }
    };
    Ok(if known { Value::str(PHP_VERSION) } else { Value::Bool(false) })
}

/// Swap in a new reporting level, returning the previous one
fn set_level(ctx: &mut Context<'_>, level: i64) -> i64 {
    let old = ctx.interp().error_reporting();
    ctx.interp().set_error_reporting(level);
    debug!(old, new = level, "error_reporting changed");
    old
}

fn error_reporting(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [level] = ParamValidator::new("error_reporting")
        .optional("$error_level", &["int"], Value::Null)
        .bind(args)?;
    Ok(Value::Int(match level {
        Value::Null => ctx.interp().error_reporting(),
        level => set_level(ctx, level.to_int()),
    }))
}

fn function_exists(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [name] = ParamValidator::new("function_exists")
        .param("$function", &["string"])
        .bind(args)?;
    let exists = ctx.env().borrow().function_exists(&name.to_php_string());
    Ok(Value::Bool(exists))
}

/// `getenv()` is the whole of `$_ENV`; `getenv($name)` one entry or false
fn getenv(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [name, _local_only] = ParamValidator::new("getenv")
        .optional("$name", &["string"], Value::Null)
        .optional("$local_only", &["bool"], Value::Bool(false))
        .bind(args)?;
    let env = ctx.interp().global_env().borrow().lookup_variable("_ENV");
    let Some(Value::Array(vars)) = env else {
        return Ok(Value::Bool(false));
    };
    Ok(match name {
        Value::Null => Value::Array(vars),
        name => vars
            .get(&ArrayKey::from_str_key(&name.to_php_string()))
            .cloned()
            .unwrap_or(Value::Bool(false)),
    })
}

fn ini_get(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [option] = ParamValidator::new("ini_get")
        .param("$option", &["string"])
        .bind(args)?;
    Ok(match option.to_php_string().as_str() {
        "error_reporting" => Value::Str(ctx.interp().error_reporting().to_string()),
        _ => Value::Bool(false),
    })
}

fn ini_set(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [option, value] = ParamValidator::new("ini_set")
        .param("$option", &["string"])
        .param("$value", &["string", "int", "float", "bool", "null"])
        .bind(args)?;
    Ok(match option.to_php_string().as_str() {
        "error_reporting" => Value::Str(set_level(ctx, value.to_int()).to_string()),
        _ => Value::Bool(false),
    })
}
