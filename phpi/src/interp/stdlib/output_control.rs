//! ob_* functions

use super::{Context, NativeFn};
use crate::interp::env::Environment;
use crate::interp::error::{PhpError, PhpResult};
use crate::interp::validator::ParamValidator;
use crate::interp::value::Value;
use tracing::debug;

pub fn register(env: &mut Environment) {
    let functions: [(&str, NativeFn); 9] = [
        ("ob_clean", ob_clean),
        ("ob_end_clean", ob_end_clean),
        ("ob_end_flush", ob_end_flush),
        ("ob_flush", ob_flush),
        ("ob_get_clean", ob_get_clean),
        ("ob_get_contents", ob_get_contents),
        ("ob_get_flush", ob_get_flush),
        ("ob_get_level", ob_get_level),
        ("ob_start", ob_start),
    ];
    for (name, function) in functions {
        env.register_native(name, function);
    }
}

fn no_args(name: &str, args: Vec<Value>) -> PhpResult<()> {
    ParamValidator::new(name).bind::<0>(args)?;
    Ok(())
}

/// Turn a failed buffer operation into `false` plus its notice
fn outcome(ctx: &mut Context<'_>, ok: bool, notice: &str) -> Value {
    if !ok {
        ctx.warn(PhpError::notice(notice));
    }
    Value::Bool(ok)
}

fn ob_start(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_start", args)?;
    ctx.output().push();
    debug!(level = ctx.output().level(), "output buffer started");
    Ok(Value::Bool(true))
}

fn ob_clean(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_clean", args)?;
    let ok = ctx.output().clean();
    Ok(outcome(ctx, ok, "ob_clean(): Failed to delete buffer. No buffer to delete"))
}

fn ob_flush(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_flush", args)?;
    let ok = ctx.output().flush();
    Ok(outcome(ctx, ok, "ob_flush(): Failed to flush buffer. No buffer to flush"))
}

fn ob_end_clean(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_end_clean", args)?;
    let ok = ctx.output().pop().is_some();
    debug!(level = ctx.output().level(), "output buffer discarded");
    Ok(outcome(ctx, ok, "ob_end_clean(): Failed to delete buffer. No buffer to delete"))
}

fn ob_end_flush(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_end_flush", args)?;
    let ok = ctx.output().end_flush();
    debug!(level = ctx.output().level(), "output buffer flushed");
    Ok(outcome(
        ctx,
        ok,
        "ob_end_flush(): Failed to delete and flush buffer. No buffer to delete or flush",
    ))
}

fn ob_get_clean(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_get_clean", args)?;
    Ok(match ctx.output().pop() {
        Some(content) => Value::Str(content),
        None => Value::Bool(false),
    })
}

fn ob_get_flush(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_get_flush", args)?;
    let content = ctx.output().contents().map(str::to_string);
    match content {
        Some(content) => {
            ctx.output().end_flush();
            Ok(Value::Str(content))
        }
        None => Ok(outcome(
            ctx,
            false,
            "ob_get_flush(): Failed to delete and flush buffer. No buffer to delete or flush",
        )),
    }
}

fn ob_get_contents(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_get_contents", args)?;
    Ok(match ctx.output().contents() {
        Some(content) => Value::str(content),
        None => Value::Bool(false),
    })
}

fn ob_get_level(ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    no_args("ob_get_level", args)?;
    Ok(Value::Int(ctx.output().level() as i64))
}
