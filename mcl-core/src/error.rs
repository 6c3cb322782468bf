//! Error types for the MCL front-end

use std::fmt;
use thiserror::Error;

use crate::lexer::Span;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Syntax or inline semantic violation found by the parser; parsing stops
    /// at the first one.
    #[error("Syntax error at {line}:{col} [pos {position}]: {message}")]
    Syntax {
        message: String,
        /// Index of the offending token
        position: usize,
        line: usize,
        col: usize,
    },

    /// Violation found by the standalone semantic pass
    #[error("Semantic error: {message}")]
    Semantic { message: String },

    /// Invalid `mcl.toml`
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl Error {
    pub fn syntax(message: impl Into<String>, position: usize, span: Span) -> Self {
        Error::Syntax {
            message: message.into(),
            position,
            line: span.line,
            col: span.col,
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Error::Semantic { message: message.into() }
    }

    /// The bare message, without location or category prefix
    pub fn message(&self) -> &str {
        match self {
            Error::Syntax { message, .. }
            | Error::Semantic { message }
            | Error::Config { message }
            | Error::Io { message } => message,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io { message: err.to_string() }
    }
}

/// Ordered collection of errors, used by passes that keep going after the
/// first violation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Errors {
    errors: Vec<Error>,
}

impl Errors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    /// Bare messages, in the order they were found
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(Error::message).collect()
    }

    /// Ok if no errors were collected
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, Self> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} error(s):", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "\n[{}] {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        let mut errors = Errors::new();
        errors.push(error);
        errors
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
