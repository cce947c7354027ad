//! Error types for CamConnect

use thiserror::Error;

/// Main error type for CamConnect configuration and setup
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration directory not found")]
    NoConfigDir,

}

/// Result type alias using CamConnect's Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::config("device host must not be empty").to_string(),
            "Configuration error: device host must not be empty"
        );
        assert_eq!(
            Error::NoConfigDir.to_string(),
            "Configuration directory not found"
        );
    }
}
