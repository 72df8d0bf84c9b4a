//! Error types for pixeldump.

use thiserror::Error;

/// Main error type for all pixeldump operations.
#[derive(Debug, Error)]
pub enum PixelflutError {
    /// Establishing a TCP connection to the server failed.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// The `host:port` endpoint that refused us.
        address: String,
        /// Underlying socket error.
        source: std::io::Error,
    },

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response line did not match the expected wire pattern.
    #[error("malformed response line: {0:?}")]
    Parse(String),

    /// Operation attempted on a closed connection, or the server hung up.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using PixelflutError.
pub type Result<T> = std::result::Result<T, PixelflutError>;
