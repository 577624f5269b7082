use std::collections::TryReserveError;
use std::fmt;

/// The kind of failure reported by compilation or by a run.
///
/// Every kind except [`ErrorKind::OutOfMemory`] describes a structurally
/// invalid pattern. A run can only ever fail with `OutOfMemory`.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An arena could not be allocated, or would have exceeded the
    /// configured size limit.
    OutOfMemory,
    /// The pattern, a group or an alternation branch is empty.
    EmptyExpression,
    /// A `(` was never closed, or a `)` has no matching `(`.
    UnbalancedParentheses,
    /// A `\` was followed by a byte that cannot be escaped.
    InvalidEscape,
    /// A quantifier (`*`, `+` or `?`) has nothing to apply to.
    NoOperand,
    /// A byte that cannot start a UTF-8 sequence, or a truncated sequence.
    InvalidUtf8,
}

impl ErrorKind {
    fn description(&self) -> &'static str {
        match *self {
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::EmptyExpression => "empty expression",
            ErrorKind::UnbalancedParentheses => "unbalanced parentheses",
            ErrorKind::InvalidEscape => "invalid escape sequence",
            ErrorKind::NoOperand => "quantifier without operand",
            ErrorKind::InvalidUtf8 => "invalid UTF-8 sequence",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// An error that occurred while compiling a pattern or running it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    offset: Option<usize>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, offset: usize) -> Error {
        Error { kind, offset: Some(offset) }
    }

    pub(crate) fn out_of_memory() -> Error {
        Error { kind: ErrorKind::OutOfMemory, offset: None }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the byte offset into the pattern at which compilation
    /// stopped.
    ///
    /// This is `None` for allocation failures.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Error {
        Error::out_of_memory()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} at offset {}", self.kind, offset),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offset() {
        let err = Error::new(ErrorKind::NoOperand, 0);
        assert_eq!(err.to_string(), "quantifier without operand at offset 0");
        assert_eq!(Error::out_of_memory().to_string(), "out of memory");
    }

    #[test]
    fn reserve_failure_is_out_of_memory() {
        let mut v: Vec<u64> = Vec::new();
        let err: Error = v.try_reserve(usize::MAX).unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
        assert_eq!(err.offset(), None);
    }
}
