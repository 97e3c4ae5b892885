//! Error type for parse, apply, and query failures.

use thiserror::Error;

/// An error bound to a location in the source expression.
///
/// `offset` and `length` are byte positions into the expression the error
/// was raised against; [`Error::pretty`] renders the expression with a
/// caret underline at that span.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct Error {
    expression: String,
    message: String,
    offset: usize,
    length: usize,
}

impl Error {
    /// Create a new error at `offset`..`offset + length` within `expression`.
    /// A zero length is widened to one so the caret render always points at
    /// something.
    pub fn new(expression: &str, offset: usize, length: usize, message: impl Into<String>) -> Self {
        Error {
            expression: expression.to_string(),
            message: message.into(),
            offset,
            length: length.max(1),
        }
    }

    /// The human-readable message, without location information.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset of the error within the source expression.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes of the offending span.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Render the message, the source expression, and a `.`/`^` indicator
    /// line pointing at the offending span:
    ///
    /// ```text
    /// expected ']' after index or filter
    /// foo[
    /// ...^
    /// ```
    pub fn pretty(&self) -> String {
        let mut out = String::with_capacity(self.message.len() + self.expression.len() * 2);
        out.push_str(&self.message);
        out.push('\n');
        out.push_str(&self.expression);
        out.push('\n');
        for _ in 0..self.offset {
            out.push('.');
        }
        for _ in 0..self.length {
            out.push('^');
        }
        out
    }
}

/// Convenience alias used throughout terse-core.
pub type Result<T> = std::result::Result<T, Error>;
