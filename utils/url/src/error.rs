//! Error types for URL parsing.

use core::fmt;

/// Error type returned when URL parsing fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
}

/// The reason a URL string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The URL string is empty
    Empty,
    /// A `scheme://` URL without a host
    MissingHost,
    /// The port is empty, non-numeric or out of range
    InvalidPort,
    /// The string is longer than the parser can index
    TooLong,
}

impl ParseError {
    pub(crate) const fn new(kind: ParseErrorKind) -> Self {
        Self { kind }
    }

    /// Returns the reason the URL was rejected.
    #[must_use]
    pub const fn kind(&self) -> ParseErrorKind {
        self.kind
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParseErrorKind::Empty => write!(f, "URL string is empty"),
            ParseErrorKind::MissingHost => write!(f, "URL has a scheme but no host"),
            ParseErrorKind::InvalidPort => write!(f, "URL port is not a number in 1..=65535"),
            ParseErrorKind::TooLong => write!(f, "URL string is too long"),
        }
    }
}

impl std::error::Error for ParseError {}
