//! Authentication error taxonomy

use std::time::Duration;
use thiserror::Error;

/// Classified failure of a single login request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginFailure {
    #[error("Invalid PIN provided")]
    InvalidCredentials,
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Network error during login: {0}")]
    NetworkError(String),
}

/// Errors returned by `SessionManager::authenticate`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Not exactly four ASCII digits; no attempt consumed
    #[error("PIN must be exactly 4 digits")]
    InvalidPinFormat,
    /// Rejected before contacting the camera; no attempt consumed
    #[error("Account locked. Try again in {}", lockout_message(.remaining))]
    LockedOut { remaining: Duration },
    #[error("Invalid PIN provided")]
    InvalidCredentials,
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Network error during login: {0}")]
    NetworkError(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Errors while constructing a `SessionManager` from configuration
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] camconnect_core::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    /// Whether this failure used up one of the allowed attempts
    pub fn counts_as_attempt(&self) -> bool {
        !matches!(self, AuthError::InvalidPinFormat | AuthError::LockedOut { .. })
    }

    /// Remaining lockout time, if this is a lockout rejection
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            AuthError::LockedOut { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

impl From<LoginFailure> for AuthError {
    fn from(failure: LoginFailure) -> Self {
        match failure {
            LoginFailure::InvalidCredentials => AuthError::InvalidCredentials,
            LoginFailure::ServerError(detail) => AuthError::ServerError(detail),
            LoginFailure::NetworkError(cause) => AuthError::NetworkError(cause),
        }
    }
}

fn lockout_message(remaining: &Duration) -> String {
    format_lockout_time(*remaining)
}

/// Human-readable lockout time: "45s", "4m 10s" or "2h 5m"
pub fn format_lockout_time(remaining: Duration) -> String {
    let seconds = remaining.as_secs();
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
