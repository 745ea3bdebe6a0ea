//! Front-end error types and reporting

use crate::ast::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Error raised before evaluation starts
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Lexer error at {span}: {message}")]
    Lexer { message: String, span: Span },

    #[error("Parser error at {span}: {message}")]
    Parser { message: String, span: Span },

    #[error("IO error: {message}")]
    Io { message: String },

    /// A configuration file that does not describe a `Config`
    #[error("Config error: {message}")]
    Config { message: String },
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } | Self::Parser { span, .. } => Some(*span),
            Self::Io { .. } | Self::Config { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lexer { message, .. } => message,
            Self::Parser { message, .. } => message,
            Self::Io { message } | Self::Config { message } => message,
        }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(err: std::io::Error) -> Self {
        CompileError::io_error(err.to_string())
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        CompileError::Lexer { .. } => "Lexer",
        CompileError::Parser { .. } => "Parse",
        CompileError::Io { .. } => "IO",
        CompileError::Config { .. } => "Config",
    };

    let span = error.span().unwrap_or_default();
    let mut report = Report::build(ReportKind::Error, (filename, span.start..span.end));
    if error.span().is_some() {
        report = report.with_message(format!("{kind} error")).with_label(
            Label::new((filename, span.start..span.end))
                .with_message(error.message())
                .with_color(Color::Red),
        );
    } else {
        report = report.with_message(format!("{kind} error: {}", error.message()));
    }

    if let Err(err) = report.finish().eprint((filename, Source::from(source))) {
        tracing::warn!("failed to render diagnostic: {err}");
    }
}
