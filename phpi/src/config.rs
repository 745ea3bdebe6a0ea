//! Interpreter configuration and request inputs
//!
//! Both are plain values handed to [`crate::interp::Interpreter::new`]; the
//! interpreter never reads configuration from global state.

use crate::error::{CompileError, Result};
use crate::interp::error::E_ALL;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default recursion limit for user function calls
pub const DEFAULT_MAX_NESTING_LEVEL: usize = 1000;

/// Interpreter settings, loadable from a TOML file
///
/// ```toml
/// error_reporting = 32767
/// max_nesting_level = 512
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bitmask of `E_*` severities that are printed
    pub error_reporting: i64,
    /// Script name used in diagnostics, `__FILE__` and `$_SERVER`
    pub filename: String,
    /// Maximum depth of nested user function calls
    pub max_nesting_level: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config::dev()
    }
}

impl Config {
    /// Report every diagnostic
    pub fn dev() -> Self {
        Config {
            error_reporting: E_ALL,
            filename: String::new(),
            max_nesting_level: DEFAULT_MAX_NESTING_LEVEL,
        }
    }

    /// Report nothing
    pub fn prod() -> Self {
        Config {
            error_reporting: 0,
            ..Config::dev()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Parse a TOML document; missing keys keep their dev defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| CompileError::config(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

/// Inputs of the current request, exposed through the superglobals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    /// Environment variables (`$_ENV`, `getenv()`)
    pub env: Vec<(String, String)>,
    /// Command-line arguments after the script name (`$argv`)
    pub args: Vec<String>,
    /// Raw query string, decoded into `$_GET`
    pub query_string: String,
    /// Form-encoded request body, decoded into `$_POST`
    pub body: String,
    /// `Cookie` header, decoded into `$_COOKIE`
    pub cookie: String,
    /// Extra `$_SERVER` entries
    pub server: Vec<(String, String)>,
}

impl Request {
    /// Request for a command-line run: process environment plus arguments
    pub fn from_cli(args: Vec<String>) -> Self {
        Request {
            env: std::env::vars().collect(),
            args,
            ..Request::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(Config::dev().error_reporting, E_ALL);
        assert_eq!(Config::prod().error_reporting, 0);
        assert_eq!(Config::default(), Config::dev());
    }

    #[test]
    fn test_from_toml_keeps_defaults() {
        let config = Config::from_toml("error_reporting = 2").unwrap();
        assert_eq!(config.error_reporting, 2);
        assert_eq!(config.max_nesting_level, DEFAULT_MAX_NESTING_LEVEL);
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let err = Config::from_toml("error_reporting = \"all\"").unwrap_err();
        assert!(matches!(err, CompileError::Config { .. }), "{err:?}");
        assert!(err.to_string().starts_with("Config error: "), "{err}");
        assert_eq!(err.span(), None);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load(Path::new("no-such-config.toml")).unwrap_err();
        assert!(matches!(err, CompileError::Io { .. }), "{err:?}");
    }

    #[test]
    fn test_request_from_toml() {
        let request: Request = toml::from_str("query_string = \"a=1\"\ncookie = \"c=2\"").unwrap();
        assert_eq!(request.query_string, "a=1");
        assert_eq!(request.cookie, "c=2");
        assert!(request.body.is_empty());
    }
}
