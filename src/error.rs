//! Error types for sgw-client.

use thiserror::Error;

/// Main error type for all gateway client operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (document helpers only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (truncated payload, negative map count, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A string field does not fit the 16-bit length prefix.
    #[error("String of {0} bytes exceeds the 65535 byte wire limit")]
    StringTooLong(usize),

    /// A frame declared a length above the configured maximum.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: u32, max: u32 },

    /// No socket is available for sending.
    #[error("Not connected to gateway")]
    NotConnected,

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The gateway answered with `ok = false`.
    #[error("Gateway error: {0}")]
    Server(String),

    /// A COUNT response carried a value that is not an integer.
    #[error("Invalid count response: {0}")]
    InvalidCount(String),

    /// A request identifier is already registered.
    #[error("Duplicate request ID: {0}")]
    DuplicateRequestId(String),

    /// Caller-side deadline elapsed before a response arrived.
    #[error("Timed out waiting for response")]
    Timeout,

    /// The completion handle was dropped without being resolved.
    #[error("Request canceled")]
    Canceled,

    /// Backpressure timeout - write queue full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
