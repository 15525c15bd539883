//! Error management module

use std::fmt;

/// A malformed-input or budget violation detected by the reader.
///
/// Every syntax error is fatal for the document being parsed: the reader
/// must be [reset] before it can be used again.
///
/// [reset]: crate::XmlReader::reset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    message: String,
    line: usize,
}

impl SyntaxError {
    /// Creates a new error at the given 1-based line.
    pub fn new<S: Into<String>>(message: S, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }

    /// Describes what went wrong, without the line number.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The 1-based line of the input source that was active when the error
    /// was detected.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at line {}", self.message, self.line)
    }
}

/// The error type used by this crate.
#[derive(Debug)]
pub enum Error {
    /// IO error reported by an input source or a resolver. It is passed
    /// through unmodified.
    Io(std::io::Error),
    /// Input bytes are not valid in the encoding of the source
    NonDecodable(&'static str),
    /// The document is not well-formed, violates a DTD-level constraint or
    /// exceeds one of the configured budgets
    Syntax(SyntaxError),
    /// The blocking [`next()`] found no data available in its input source.
    /// Non-blocking sources must be driven with [`advance()`].
    ///
    /// [`next()`]: crate::XmlReader::next
    /// [`advance()`]: crate::XmlReader::advance
    WouldBlock,
}

impl Error {
    /// Returns the syntax error if this is one.
    pub fn as_syntax(&self) -> Option<&SyntaxError> {
        match self {
            Error::Syntax(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    /// Creates a new `Error::Io` from the given error
    #[inline]
    fn from(error: std::io::Error) -> Error {
        Error::Io(error)
    }
}

impl From<SyntaxError> for Error {
    #[inline]
    fn from(error: SyntaxError) -> Error {
        Error::Syntax(error)
    }
}

/// A specialized `Result` type where the error is hard-wired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NonDecodable(encoding) => {
                write!(f, "Malformed input, cannot decode as {}", encoding)
            }
            Error::Syntax(e) => write!(f, "Syntax error: {}", e),
            Error::WouldBlock => write!(f, "No input available, the source would block"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn syntax_display_has_line() {
        let e = Error::from(SyntaxError::new("unmatched element", 3));
        assert_eq!(e.to_string(), "Syntax error: unmatched element at line 3");
        assert_eq!(e.as_syntax().map(SyntaxError::line), Some(3));
    }

    #[test]
    fn io_is_source() {
        use std::error::Error as _;

        let e = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "gone"));
        assert!(e.source().is_some());
        assert!(e.as_syntax().is_none());
    }
}
