//! Error types for the gatewire-ibapi library.

use thiserror::Error;

/// Top-level error type for the protocol engine.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dial failure or a write that could not reach the socket.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The peer closed the connection, or the client was closed locally.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// The handshake reply was not the expected `[version, time]` pair.
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// A non-empty numeric field that does not parse.
    #[error("Malformed {kind} field '{value}'")]
    MalformedField { kind: &'static str, value: String },

    /// Fewer bytes than the frame header declares.
    #[error("Truncated frame: need {needed} bytes, {available} available")]
    TruncatedFrame { needed: usize, available: usize },

    /// A field sequence ran out before a decoder finished.
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Protocol-level violation (bad frame length, bad message layout, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The negotiated server version is below what a request needs.
    #[error("{feature} requires server version {required}, connected at {actual}")]
    UnsupportedFeature {
        feature: &'static str,
        required: i32,
        actual: i32,
    },

    /// The caller cancelled the request.
    #[error("Request {request_id} cancelled")]
    Cancelled { request_id: i32 },

    /// Error reported by TWS/Gateway for a specific request.
    #[error("Server error (id={id}, code={code}): {message}")]
    Server {
        id: i32,
        code: i32,
        message: String,
        advanced_order_reject_json: String,
    },

    /// Operation timed out waiting for a response.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Failed to encode an outgoing message.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Wire-format and layout errors: bad frames, bad fields, exhausted decoders.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::MalformedField { .. }
                | Self::TruncatedFrame { .. }
                | Self::Decode(_)
                | Self::Protocol(_)
        )
    }

    /// Errors that mean the connection itself is unusable.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ConnectionClosed(_) | Self::Handshake(_) | Self::Io(_)
        )
    }
}

/// Convenience Result type for this library.
pub type Result<T> = std::result::Result<T, ClientError>;
