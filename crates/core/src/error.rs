//! Error types for mpos-core

use thiserror::Error;

use crate::notice;
use crate::transport::ConnectionResult;

/// Rejected user input. Nothing is framed or sent when one of these is raised.
///
/// `Display` yields the notice shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{}", notice::AMOUNT_NOT_NUMERIC)]
    AmountNotNumeric { input: String },

    #[error("{}", notice::AMOUNT_TOO_LOW)]
    AmountTooLow { amount: i64 },

    #[error("{}", notice::AMOUNT_TOO_HIGH)]
    AmountTooHigh { amount: i64 },

    #[error("{}", notice::OPERATION_NUMBER_NOT_NUMERIC)]
    OperationNumberNotNumeric { input: String },

    #[error("{}", notice::OPERATION_NUMBER_NOT_POSITIVE)]
    OperationNumberNotPositive { operation_number: i64 },

    #[error("{}", notice::OPERATION_NUMBER_TOO_HIGH)]
    OperationNumberTooHigh { operation_number: i64 },
}

/// Wire-format violations on either side of the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("character {ch:?} (U+{scalar:04X}) at position {position} does not fit in one byte")]
    NonByteCharacter { ch: char, scalar: u32, position: usize },

    #[error("frame is missing its {0} marker")]
    MissingMarker(&'static str),

    #[error("frame has no checksum byte after ETX")]
    MissingChecksum,

    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{got:02X}")]
    ChecksumMismatch { expected: u8, got: u8 },
}

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("No terminal available")]
    NoTerminalFound,

    #[error("Connection failed: {0:?}")]
    ConnectFailed(ConnectionResult),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Event channel closed")]
    ChannelClosed,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Operator-facing notice for errors that surface as a transient message.
    ///
    /// Returns `None` for programming or environment errors that are only logged.
    pub fn notice(&self) -> Option<String> {
        match self {
            CoreError::Validation(err) => Some(err.to_string()),
            CoreError::NotConnected => Some(notice::NOT_CONNECTED.to_string()),
            CoreError::ConnectFailed(_) => Some(notice::CONNECT_FAILED.to_string()),
            CoreError::NoTerminalFound => Some(notice::NO_TERMINAL_FOUND.to_string()),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;
