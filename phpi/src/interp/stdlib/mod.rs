//! Native function library
//!
//! Every native function has the signature [`NativeFn`] and binds its
//! arguments through a [`ParamValidator`](super::ParamValidator) before
//! doing any work. Fatal errors are returned; warnings and notices go
//! through [`Context::warn`] and execution continues.
//!
//! Functions listed by [`takes_reference`] receive their first argument
//! by reference: the caller writes back whatever the function hands to
//! [`Context::set_reference`].

mod array;
mod datetime;
mod math;
mod misc;
mod output_control;
mod string;
mod variable_handling;

use super::env::{EnvRef, Environment};
use super::error::{PhpError, PhpResult};
use super::eval::Interpreter;
use super::output::OutputBuffers;
use super::value::Value;
use crate::ast::Span;

/// Native function pointer
pub type NativeFn = fn(&mut Context<'_>, Vec<Value>) -> PhpResult<Value>;

/// What a native function sees of the running interpreter
pub struct Context<'a> {
    interp: &'a mut Interpreter,
    env: EnvRef,
    span: Span,
    /// New value of a by-reference first argument
    reference: Option<Value>,
}

impl<'a> Context<'a> {
    pub fn new(interp: &'a mut Interpreter, env: EnvRef, span: Span) -> Self {
        Context {
            interp,
            env,
            span,
            reference: None,
        }
    }

    /// Replace the variable passed as the by-reference first argument
    pub fn set_reference(&mut self, value: Value) {
        self.reference = Some(value);
    }

    pub fn take_reference(&mut self) -> Option<Value> {
        self.reference.take()
    }

    pub fn interp(&mut self) -> &mut Interpreter {
        self.interp
    }

    /// Scope of the call site
    pub fn env(&self) -> &EnvRef {
        &self.env
    }

    /// Report a non-fatal diagnostic at the call site
    pub fn warn(&mut self, err: PhpError) {
        self.interp.warn(err, self.span);
    }

    pub fn print(&mut self, text: &str) {
        self.interp.print(text);
    }

    pub fn output(&mut self) -> &mut OutputBuffers {
        self.interp.output_mut()
    }
}

/// Whether the native `name` takes its first argument by reference
pub fn takes_reference(name: &str) -> bool {
    array::BY_REFERENCE
        .iter()
        .any(|by_ref| by_ref.eq_ignore_ascii_case(name))
}

/// Register every native function into the root scope
pub fn register(env: &mut Environment) {
    array::register(env);
    datetime::register(env);
    math::register(env);
    misc::register(env);
    output_control::register(env);
    string::register(env);
    variable_handling::register(env);
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::{Config, Request};
    use crate::interp::Interpreter;

    /// Output of running `source` as a script; panics on a fatal error
    pub fn run(source: &str) -> String {
        let mut interp = Interpreter::new(Config::dev().with_filename("test.php"), Request::default());
        let (output, error) = interp.process(&format!("<?php {source}"));
        if let Some(err) = error {
            panic!("{err}\noutput so far: {output}");
        }
        output
    }

    /// Message of the fatal error raised by `source`
    pub fn fatal(source: &str) -> String {
        let mut interp = Interpreter::new(Config::dev().with_filename("test.php"), Request::default());
        let (_, error) = interp.process(&format!("<?php {source}"));
        error.map(|err| err.message().to_string()).unwrap_or_default()
    }
}
