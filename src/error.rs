// Error types shared by the probe database parser and the detection engine
use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::probes::Match;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed directive: {0}")]
    Malformed(String),

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Unterminated `{flag}` field in version info")]
    UnterminatedField { flag: &'static str },

    #[error("Invalid escape sequence: {0}")]
    InvalidEscape(String),

    #[error(transparent)]
    IncompleteMatch(#[from] Box<Partial<Match>>),
}

impl ParseError {
    /// The best-effort match carried by an incomplete match error, if any.
    pub fn partial_match(&self) -> Option<&Match> {
        match self {
            ParseError::IncompleteMatch(partial) => Some(&partial.value),
            _ => None,
        }
    }
}

/// A failure that still produced a usable value.
///
/// `value` holds whatever was assembled before `error` stopped the work, so
/// callers can decide whether to keep or discard the partial data.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Partial<T: fmt::Debug> {
    pub value: T,
    #[source]
    pub error: ParseError,
}

impl<T: fmt::Debug> Partial<T> {
    pub fn new(value: T, error: ParseError) -> Self {
        Self { value, error }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CpeError {
    #[error("CPE must start with 'cpe:/' or 'cpe:2.3:': {0}")]
    InvalidPrefix(String),

    #[error("CPE has too few components: {0}")]
    TooFewComponents(String),

    #[error("Invalid CPE part: {0}")]
    InvalidPart(String),
}

#[derive(Error, Debug)]
pub enum MatchEngineError {
    #[error("Failed to compile pattern `{pattern}`: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Error connecting: {0}")]
    Connect(#[source] io::Error),

    #[error("Error sending command: {0}")]
    Send(#[source] io::Error),

    #[error("Error receiving response: {0}")]
    Receive(#[source] io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

pub type ParseResult<T> = Result<T, ParseError>;
