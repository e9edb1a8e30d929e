use std::error::Error as StdError;
use std::fmt;

use crate::lexer::TokenizerError;

/// The three kinds of failure a program can surface, split by the stage
/// that raised them.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed source text, or a malformed special-form operand tree.
    Syntax(String),
    /// Lookup of a symbol with no binding in any enclosing scope.
    Name(String),
    /// Type mismatch, arity mismatch, or an out-of-range operation.
    Runtime(String),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Syntax(msg) => write!(fmt, "syntax error: {}", msg),
            Error::Name(msg) => write!(fmt, "name error: {}", msg),
            Error::Runtime(msg) => write!(fmt, "runtime error: {}", msg),
        }
    }
}

impl StdError for Error {}

impl From<TokenizerError> for Error {
    fn from(err: TokenizerError) -> Error {
        Error::Syntax(err.to_string())
    }
}
