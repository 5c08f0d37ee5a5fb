//! Error types for the tunnel engine

use thiserror::Error;

use crate::adapter::AdapterStateKind;

/// Result type alias for configuration and I/O operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to parse configuration file
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_) | Error::ConfigParse(_))
    }
}

/// Errors from parsing an engine-delivered resource list
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Malformed JSON, unknown resource type or missing field
    #[error("invalid resource list: {0}")]
    Json(#[from] serde_json::Error),
}

/// Interface address string that does not parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid interface address: {0:?}")]
pub struct AddressError(pub String);

/// Failure reported by the tunnel engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SessionError(pub String);

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors returned by [`crate::Adapter`] operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Operation not allowed in the current state
    #[error("invalid state: operation not allowed while {state}")]
    InvalidState { state: AdapterStateKind },

    /// The OS rejected the network settings
    #[error("failed to set network settings: {0}")]
    SetNetworkSettings(#[from] gate_tun::Error),

    /// The engine could not establish a session
    #[error("session establishment failed: {0}")]
    SessionEstablishment(#[from] SessionError),

    /// Engine-delivered resources could not be parsed
    #[error("resource parse error: {0}")]
    ResourceParse(#[from] ResourceError),

    /// Engine-delivered interface addresses could not be parsed
    #[error("interface address error: {0}")]
    InterfaceAddress(#[from] AddressError),

    /// The adapter task is no longer running
    #[error("adapter has shut down")]
    Shutdown,
}

impl AdapterError {
    /// Check if this is an invalid state error
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, AdapterError::InvalidState { .. })
    }

    /// Check if the error is worth retrying later
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AdapterError::SetNetworkSettings(_) | AdapterError::SessionEstablishment(_)
        )
    }
}
