//! Error types shared by the codec, transport, endpoints and broker

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, DomoError>;

/// Everything that can go wrong while moving envelopes around
#[derive(Debug, Error)]
pub enum DomoError {
    /// Fewer than 4 bytes remained where a part-length header was expected
    #[error("corrupt message part in size")]
    CorruptLength,

    /// A part declared more bytes than the buffer still holds
    #[error("corrupt message part in data: declared {declared} bytes, {remaining} remaining")]
    CorruptBody { declared: usize, remaining: usize },

    /// Malformed framed message, bad routing id or bad connection greeting
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Socket kind does not fit the requested shape or message form
    #[error("unsupported socket kind: {0}")]
    UnsupportedSocketKind(String),

    /// Address could not be parsed or resolved
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The socket's I/O thread is gone (peer hung up or socket shut down)
    #[error("socket disconnected")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DomoError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedSocketKind(msg.into())
    }
}
