//! Configuration types for CamConnect

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Address of the camera on its own Wi-Fi access point
pub const DEFAULT_DEVICE_HOST: &str = "192.168.2.1:80";

/// Path of the login endpoint on the camera
pub const LOGIN_PATH: &str = "/api/login";

/// Authentication configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Camera host, optionally with port or scheme (e.g. "192.168.2.1:80")
    pub device_host: String,
    /// Connect and request timeout for the login call
    pub login_timeout: Duration,
    /// Failed attempts allowed before a lockout window opens
    pub max_pin_attempts: u32,
    /// How long an issued session token stays valid
    pub session_timeout: Duration,
    /// Location of the persisted state file (platform default if None)
    pub state_path: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            device_host: DEFAULT_DEVICE_HOST.to_string(),
            login_timeout: Duration::from_secs(10),
            max_pin_attempts: 3,
            session_timeout: Duration::from_secs(24 * 60 * 60),
            state_path: None,
        }
    }
}

impl AuthConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set camera host
    pub fn with_device_host(mut self, host: impl Into<String>) -> Self {
        self.device_host = host.into();
        self
    }

    /// Builder pattern: set login timeout
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Builder pattern: set attempt ceiling
    pub fn with_max_pin_attempts(mut self, attempts: u32) -> Self {
        self.max_pin_attempts = attempts;
        self
    }

    /// Builder pattern: set session validity window
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Builder pattern: set state file location
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Full URL of the login endpoint
    pub fn login_url(&self) -> String {
        let host = self.device_host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}{}", host, LOGIN_PATH)
        } else {
            format!("http://{}{}", host, LOGIN_PATH)
        }
    }

    /// Resolve the state file path (~/.config/camconnect/session.json by default)
    pub fn resolved_state_path(&self) -> Result<PathBuf> {
        match &self.state_path {
            Some(path) => Ok(path.clone()),
            None => {
                let config_dir = dirs::config_dir().ok_or(Error::NoConfigDir)?;
                Ok(config_dir.join("camconnect").join("session.json"))
            }
        }
    }

    /// Reject values the authentication core cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.device_host.trim().is_empty() {
            return Err(Error::config("device host must not be empty"));
        }
        if self.login_timeout.is_zero() {
            return Err(Error::config("login timeout must be greater than zero"));
        }
        if self.max_pin_attempts == 0 {
            return Err(Error::config("max PIN attempts must be at least 1"));
        }
        if self.session_timeout.is_zero() {
            return Err(Error::config("session timeout must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.login_url(), "http://192.168.2.1:80/api/login");
        assert_eq!(config.login_timeout, Duration::from_secs(10));
        assert_eq!(config.max_pin_attempts, 3);
        assert_eq!(config.session_timeout, Duration::from_secs(86_400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_login_url_keeps_explicit_scheme() {
        let config = AuthConfig::new().with_device_host("http://127.0.0.1:8080/");
        assert_eq!(config.login_url(), "http://127.0.0.1:8080/api/login");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(AuthConfig::new().with_device_host(" ").validate().is_err());
        assert!(AuthConfig::new()
            .with_login_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(AuthConfig::new().with_max_pin_attempts(0).validate().is_err());
    }

    #[test]
    fn test_explicit_state_path() {
        let config = AuthConfig::new().with_state_path("/tmp/cam/state.json");
        assert_eq!(
            config.resolved_state_path().unwrap(),
            PathBuf::from("/tmp/cam/state.json")
        );
    }
}
