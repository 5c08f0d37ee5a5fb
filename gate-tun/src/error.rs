//! Error types for gate-tun

use thiserror::Error;

/// Result type alias for gate-tun operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or applying tunnel settings
#[derive(Debug, Error)]
pub enum Error {
    /// The OS reported an error while applying network settings
    #[error("settings application failed: {0}")]
    SettingsRejected(String),

    /// The provider could not issue the request at all
    #[error("tunnel provider error: {0}")]
    Provider(String),
}

impl Error {
    /// Check if the OS rejected the settings
    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::SettingsRejected(_))
    }
}
