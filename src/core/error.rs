/*!
Error handling for streaming secure-element sessions.

Session-level failures (ordering, exclusivity, parameters, authentication)
are reported separately from the status codes returned by the secure element,
so callers can always tell an authentication failure from a transport failure.
*/

use std::fmt;
use std::io;
use thiserror::Error;

use crate::core::session::state::Phase;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for raw secure-element commands
pub type SeResult<T> = std::result::Result<T, SeStatus>;

/// Identifier handed out for every session that acquires a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Error type for streaming sessions
#[derive(Error, Debug)]
pub enum Error {
    /// Another session holds the command channel
    #[error("Command channel busy: held by {owner}")]
    ChannelBusy {
        /// Session currently owning the channel
        owner: SessionId,
    },

    /// Operation called out of order, or after finish/abort
    #[error("Invalid sequence: expected {expected}, but session was {actual}")]
    InvalidSequence {
        expected: &'static str,
        actual: Phase,
    },

    /// Bad key/algorithm pairing or malformed IV, tag or buffer
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failure reported verbatim by the secure element
    #[error("Secure element failure: {0}")]
    Underlying(#[from] SeStatus),

    /// Authentication tag did not verify (limited details for security)
    #[error("Authentication tag mismatch")]
    TagMismatch,

    /// IO error from a stream helper
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error must be treated as a security rejection rather than
    /// a retryable failure
    pub fn is_security_relevant(&self) -> bool {
        matches!(self, Error::TagMismatch)
    }

    /// Status code of the underlying element failure, if any
    pub fn status(&self) -> Option<SeStatus> {
        match self {
            Error::Underlying(status) => Some(*status),
            _ => None,
        }
    }
}

/// Closed set of failure codes returned by the secure-element command layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeStatus {
    /// Generic command failure
    Fail,

    /// The element rejected a parameter
    InvalidParameter,

    /// Key type or size not accepted for this command
    InvalidKey,

    /// Signature or tag check failed inside the element
    InvalidSignature,

    /// Command not valid in the element's current state
    InvalidCommand,

    /// Command not supported by this element
    NotSupported,

    /// Element busy with another command
    Busy,

    /// Command aborted by the element
    Aborted,
}

impl SeStatus {
    /// Stable numeric status code
    pub fn code(&self) -> u32 {
        match self {
            SeStatus::Fail => 0x0001,
            SeStatus::InvalidParameter => 0x0021,
            SeStatus::InvalidKey => 0x0024,
            SeStatus::InvalidSignature => 0x0025,
            SeStatus::InvalidCommand => 0x0027,
            SeStatus::NotSupported => 0x000F,
            SeStatus::Busy => 0x0004,
            SeStatus::Aborted => 0x0006,
        }
    }

    /// Map a numeric status code back to a status, `None` for unknown codes
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x0001 => Some(SeStatus::Fail),
            0x0021 => Some(SeStatus::InvalidParameter),
            0x0024 => Some(SeStatus::InvalidKey),
            0x0025 => Some(SeStatus::InvalidSignature),
            0x0027 => Some(SeStatus::InvalidCommand),
            0x000F => Some(SeStatus::NotSupported),
            0x0004 => Some(SeStatus::Busy),
            0x0006 => Some(SeStatus::Aborted),
            _ => None,
        }
    }
}

impl fmt::Display for SeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeStatus::Fail => "command failed",
            SeStatus::InvalidParameter => "invalid parameter",
            SeStatus::InvalidKey => "invalid key",
            SeStatus::InvalidSignature => "invalid signature",
            SeStatus::InvalidCommand => "invalid command",
            SeStatus::NotSupported => "not supported",
            SeStatus::Busy => "busy",
            SeStatus::Aborted => "aborted",
        };
        write!(f, "{} (0x{:04x})", name, self.code())
    }
}

impl std::error::Error for SeStatus {}

/// Create an invalid sequence error
#[macro_export]
macro_rules! invalid_sequence_err {
    ($expected:expr, $actual:expr) => {
        Err($crate::core::error::Error::InvalidSequence {
            expected: $expected,
            actual: $actual,
        })
    };
}

/// Create an invalid parameter error
#[macro_export]
macro_rules! param_err {
    ($msg:expr) => {
        Err($crate::core::error::Error::InvalidParameter($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::core::error::Error::InvalidParameter(format!($fmt, $($arg)*)))
    };
}

/// Convert from Error to io::Error (for the stream helpers)
impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(io_error) => io_error,
            Error::ChannelBusy { owner } => io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("Command channel busy: held by {}", owner),
            ),
            Error::InvalidSequence { expected, actual } => io::Error::new(
                io::ErrorKind::Other,
                format!("Invalid sequence: expected {}, but session was {}", expected, actual),
            ),
            Error::InvalidParameter(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            Error::Underlying(status) => io::Error::new(io::ErrorKind::Other, status),
            Error::TagMismatch => {
                io::Error::new(io::ErrorKind::PermissionDenied, "Authentication tag mismatch")
            }
            Error::Internal(msg) => io::Error::new(io::ErrorKind::Other, msg),
        }
    }
}
