//! CamConnect Core - Shared configuration and error types
//!
//! This crate provides the configuration consumed by the authentication core
//! and by the command-line front end.

pub mod config;
pub mod error;

pub use config::{AuthConfig, DEFAULT_DEVICE_HOST, LOGIN_PATH};
pub use error::{Error, Result};
