//! Shared error type across wshub crates.

use thiserror::Error;

/// Client-facing error codes (stable API, carried in `error` envelopes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Frame was not valid JSON.
    InvalidJson,
    /// Well-formed JSON with missing or malformed fields.
    BadRequest,
    /// No handler registered for the message type.
    UnknownType,
    /// Target connection is not registered.
    NotConnected,
    /// Connection id already registered.
    DuplicateConnection,
    /// Write to the transport failed.
    Transport,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::InvalidJson => "INVALID_JSON",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::UnknownType => "UNKNOWN_TYPE",
            ClientCode::NotConnected => "NOT_CONNECTED",
            ClientCode::DuplicateConnection => "DUPLICATE_CONNECTION",
            ClientCode::Transport => "TRANSPORT",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HubError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("connection not registered: {0}")]
    NotConnected(String),
    #[error("connection already registered: {0}")]
    DuplicateConnection(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl HubError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            HubError::InvalidJson(_) => ClientCode::InvalidJson,
            HubError::BadRequest(_) => ClientCode::BadRequest,
            HubError::UnknownType(_) => ClientCode::UnknownType,
            HubError::NotConnected(_) => ClientCode::NotConnected,
            HubError::DuplicateConnection(_) => ClientCode::DuplicateConnection,
            HubError::Transport(_) => ClientCode::Transport,
            HubError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            HubError::Internal(_) => ClientCode::Internal,
        }
    }
}
