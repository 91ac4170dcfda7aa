//! Domain-specific error types for the fpb client.
//!
//! Internals return `Result<T, FpbError>`. Sessions never bubble these up to
//! their callers: every error is folded into the session's outcome record at
//! the session boundary.

use thiserror::Error;

/// The canonical error type for the fpb client.
#[derive(Debug, Error)]
pub enum FpbError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// The stream finished before the device sent a `result` frame.
    #[error("Stream ended without result")]
    StreamEnded,

    /// A frame was well-formed but its content violated the protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    // ── Connection Errors ────────────────────────────────────────
    /// The request could not be sent or the body could not be read.
    #[error("connection error: {0}")]
    Connection(String),

    /// The device server answered with a non-success status.
    #[error("device server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    // ── Serialization Errors ─────────────────────────────────────
    /// Encoding or decoding of a payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Session Errors ───────────────────────────────────────────
    /// A session precondition was not met; no network call was made.
    #[error("{0}")]
    Precondition(String),

    /// The session was cancelled through the cancel gate.
    #[error("cancelled")]
    Cancelled,

    // ── Local I/O ────────────────────────────────────────────────
    /// Reading a local file or directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for FpbError {
    fn from(s: String) -> Self {
        FpbError::Other(s)
    }
}

impl From<&str> for FpbError {
    fn from(s: &str) -> Self {
        FpbError::Other(s.to_string())
    }
}

impl From<reqwest::Error> for FpbError {
    fn from(e: reqwest::Error) -> Self {
        FpbError::Connection(e.to_string())
    }
}

impl From<serde_json::Error> for FpbError {
    fn from(e: serde_json::Error) -> Self {
        FpbError::Encoding(e.to_string())
    }
}

impl From<base64::DecodeError> for FpbError {
    fn from(e: base64::DecodeError) -> Self {
        FpbError::Encoding(e.to_string())
    }
}
