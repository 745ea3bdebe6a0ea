//! phpi: a tree-walking interpreter with PHP semantics
//!
//! Source text goes through [`lexer::tokenize`] and [`parser::parse`] into
//! an [`ast::Program`], which [`interp::Interpreter`] executes.

pub mod ast;
pub mod config;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;

pub use ast::Span;
pub use config::{Config, Request};
pub use error::{CompileError, Result};

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install the `tracing` subscriber when `RUST_LOG` is set; later calls are
/// no-ops. Log lines go to stderr, never into script output.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    TRACING.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        let _ = tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init();
    });
}
