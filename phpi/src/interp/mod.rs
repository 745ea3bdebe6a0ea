//! Tree-walking interpreter
//!
//! Values, scopes, operators and the evaluator, plus the native function
//! library registered into every interpreter.

mod access;
mod compare;
mod env;
pub mod error;
mod eval;
mod form;
mod ops;
mod output;
mod predefined;
mod stdlib;
mod validator;
mod value;

pub use compare::{compare, loose_eq, spaceship};
pub use env::{EnvRef, Environment};
pub use error::{ControlFlow, ErrorType, Halt, InterpResult, PhpError, PhpResult};
pub use eval::Interpreter;
pub use output::OutputBuffers;
pub use predefined::PHP_VERSION;
pub use stdlib::{Context, NativeFn};
pub use validator::{coerce_to, ParamValidator};
pub use value::{Array, ArrayKey, Numeric, Value};
