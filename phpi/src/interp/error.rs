//! Runtime diagnostics and control-flow signals for the interpreter

use super::value::Value;
use thiserror::Error;

pub const E_ERROR: i64 = 1;
pub const E_WARNING: i64 = 2;
pub const E_PARSE: i64 = 4;
pub const E_NOTICE: i64 = 8;
pub const E_CORE_ERROR: i64 = 16;
pub const E_CORE_WARNING: i64 = 32;
pub const E_COMPILE_ERROR: i64 = 64;
pub const E_COMPILE_WARNING: i64 = 128;
pub const E_USER_ERROR: i64 = 256;
pub const E_USER_WARNING: i64 = 512;
pub const E_USER_NOTICE: i64 = 1024;
pub const E_STRICT: i64 = 2048;
pub const E_RECOVERABLE_ERROR: i64 = 4096;
pub const E_DEPRECATED: i64 = 8192;
pub const E_USER_DEPRECATED: i64 = 16384;
pub const E_ALL: i64 = 32767;

/// Largest single allocation a script may request, PHP's default `memory_limit`
pub const MEMORY_LIMIT: usize = 128 * 1024 * 1024;

/// Every `E_*` constant by name
pub const ERROR_LEVELS: &[(&str, i64)] = &[
    ("E_ERROR", E_ERROR),
    ("E_WARNING", E_WARNING),
    ("E_PARSE", E_PARSE),
    ("E_NOTICE", E_NOTICE),
    ("E_CORE_ERROR", E_CORE_ERROR),
    ("E_CORE_WARNING", E_CORE_WARNING),
    ("E_COMPILE_ERROR", E_COMPILE_ERROR),
    ("E_COMPILE_WARNING", E_COMPILE_WARNING),
    ("E_USER_ERROR", E_USER_ERROR),
    ("E_USER_WARNING", E_USER_WARNING),
    ("E_USER_NOTICE", E_USER_NOTICE),
    ("E_STRICT", E_STRICT),
    ("E_RECOVERABLE_ERROR", E_RECOVERABLE_ERROR),
    ("E_DEPRECATED", E_DEPRECATED),
    ("E_USER_DEPRECATED", E_USER_DEPRECATED),
    ("E_ALL", E_ALL),
];

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Error,
    Warning,
    Parse,
    Notice,
    CoreError,
    CoreWarning,
    CompileError,
    CompileWarning,
    UserError,
    UserWarning,
    UserNotice,
    Strict,
    RecoverableError,
    Deprecated,
    UserDeprecated,
}

impl ErrorType {
    /// The `E_*` bit this severity is reported under
    pub fn level(self) -> i64 {
        match self {
            ErrorType::Error => E_ERROR,
            ErrorType::Warning => E_WARNING,
            ErrorType::Parse => E_PARSE,
            ErrorType::Notice => E_NOTICE,
            ErrorType::CoreError => E_CORE_ERROR,
            ErrorType::CoreWarning => E_CORE_WARNING,
            ErrorType::CompileError => E_COMPILE_ERROR,
            ErrorType::CompileWarning => E_COMPILE_WARNING,
            ErrorType::UserError => E_USER_ERROR,
            ErrorType::UserWarning => E_USER_WARNING,
            ErrorType::UserNotice => E_USER_NOTICE,
            ErrorType::Strict => E_STRICT,
            ErrorType::RecoverableError => E_RECOVERABLE_ERROR,
            ErrorType::Deprecated => E_DEPRECATED,
            ErrorType::UserDeprecated => E_USER_DEPRECATED,
        }
    }

    /// Fatal severities abort the script
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorType::Error
                | ErrorType::Parse
                | ErrorType::CoreError
                | ErrorType::CompileError
                | ErrorType::UserError
                | ErrorType::RecoverableError
        )
    }

    /// Label printed in front of the message
    pub fn label(self) -> &'static str {
        match self {
            ErrorType::Warning
            | ErrorType::CoreWarning
            | ErrorType::CompileWarning
            | ErrorType::UserWarning => "Warning",
            ErrorType::Notice | ErrorType::UserNotice => "Notice",
            ErrorType::Parse => "Parse error",
            ErrorType::Deprecated | ErrorType::UserDeprecated => "Deprecated",
            ErrorType::Strict => "Strict Standards",
            ErrorType::Error
            | ErrorType::CoreError
            | ErrorType::CompileError
            | ErrorType::UserError
            | ErrorType::RecoverableError => "Fatal error",
        }
    }
}

/// A diagnostic raised while running a script
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .kind.label())]
pub struct PhpError {
    pub kind: ErrorType,
    pub message: String,
}

impl PhpError {
    pub fn new(kind: ErrorType, message: impl Into<String>) -> Self {
        PhpError {
            kind,
            message: message.into(),
        }
    }

    /// Fatal error
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Warning, message)
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Notice, message)
    }

    pub fn deprecated(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Deprecated, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Parse, message)
    }

    pub fn type_error(message: impl std::fmt::Display) -> Self {
        Self::error(format!("Uncaught TypeError: {message}"))
    }

    pub fn argument_count(message: impl std::fmt::Display) -> Self {
        Self::error(format!("Uncaught ArgumentCountError: {message}"))
    }

    pub fn division_by_zero() -> Self {
        Self::error("Uncaught DivisionByZeroError: Division by zero")
    }

    pub fn modulo_by_zero() -> Self {
        Self::error("Uncaught DivisionByZeroError: Modulo by zero")
    }

    pub fn undefined_function(name: &str) -> Self {
        Self::error(format!("Uncaught Error: Call to undefined function {name}()"))
    }

    pub fn undefined_constant(name: &str) -> Self {
        Self::error(format!("Uncaught Error: Undefined constant \"{name}\""))
    }

    /// A request for `requested` bytes went over [`MEMORY_LIMIT`]
    pub fn memory_exhausted(requested: impl std::fmt::Display) -> Self {
        Self::error(format!(
            "Allowed memory size of {MEMORY_LIMIT} bytes exhausted (tried to allocate {requested} bytes)"
        ))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

/// Non-local exit that unwinds everything up to the top-level driver
#[derive(Debug, Clone, PartialEq)]
pub enum Halt {
    Error(PhpError),
    /// `exit`/`die` with the script's exit code
    Exit(i64),
}

impl From<PhpError> for Halt {
    fn from(err: PhpError) -> Self {
        Halt::Error(err)
    }
}

/// Outcome of executing a statement
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Normal,
    Return(Value),
    /// Remaining number of loop levels to leave
    Break(u32),
    Continue(u32),
}

/// Result of a native operation that can only fail with a diagnostic
pub type PhpResult<T> = Result<T, PhpError>;

/// Result for interpreter operations
pub type InterpResult<T> = Result<T, Halt>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            PhpError::division_by_zero().to_string(),
            "Fatal error: Uncaught DivisionByZeroError: Division by zero"
        );
        assert_eq!(PhpError::warning("x").to_string(), "Warning: x");
        assert_eq!(PhpError::notice("x").to_string(), "Notice: x");
        assert_eq!(PhpError::parse("x").to_string(), "Parse error: x");
        assert_eq!(PhpError::deprecated("x").to_string(), "Deprecated: x");
    }

    #[test]
    fn test_message_is_raw() {
        let err = PhpError::type_error("f(): Argument #1 ($a) must be of type int, string given");
        assert_eq!(
            err.message(),
            "Uncaught TypeError: f(): Argument #1 ($a) must be of type int, string given"
        );
    }

    #[test]
    fn test_levels_cover_e_all() {
        let all = [
            ErrorType::Error,
            ErrorType::Warning,
            ErrorType::Parse,
            ErrorType::Notice,
            ErrorType::CoreError,
            ErrorType::CoreWarning,
            ErrorType::CompileError,
            ErrorType::CompileWarning,
            ErrorType::UserError,
            ErrorType::UserWarning,
            ErrorType::UserNotice,
            ErrorType::Strict,
            ErrorType::RecoverableError,
            ErrorType::Deprecated,
            ErrorType::UserDeprecated,
        ];
        assert_eq!(all.iter().fold(0, |acc, k| acc | k.level()), E_ALL);
    }

    #[test]
    fn test_fatality() {
        assert!(PhpError::undefined_function("f").is_fatal());
        assert!(!PhpError::warning("w").is_fatal());
        assert!(PhpError::parse("p").is_fatal());
    }

    #[test]
    fn test_exact_messages() {
        assert_eq!(
            PhpError::undefined_function("foo").message(),
            "Uncaught Error: Call to undefined function foo()"
        );
        assert_eq!(
            PhpError::undefined_constant("BAR").message(),
            "Uncaught Error: Undefined constant \"BAR\""
        );
        assert_eq!(
            PhpError::modulo_by_zero().message(),
            "Uncaught DivisionByZeroError: Modulo by zero"
        );
        assert_eq!(
            PhpError::memory_exhausted(1u64 << 40).message(),
            "Allowed memory size of 134217728 bytes exhausted (tried to allocate 1099511627776 bytes)"
        );
    }

    #[test]
    fn test_halt_from_error() {
        let halt: Halt = PhpError::warning("w").into();
        assert!(matches!(halt, Halt::Error(e) if e.kind == ErrorType::Warning));
    }
}
