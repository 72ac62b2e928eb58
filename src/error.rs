//! Error types for the discovery service.
//!
//! This module defines all error types that can occur while driving a
//! discovery session, including Bluetooth, D-Bus, I/O, and configuration
//! errors.

use thiserror::Error;

/// Main error type for the discovery service.
#[derive(Error, Debug)]
pub enum DiscoveryError {
   #[error("Bluetooth error: {0}")]
   Bluetooth(#[from] bluer::Error),

   #[error("D-Bus error: {0}")]
   DBus(#[from] zbus::Error),

   #[error("D-Bus connection error: {0}")]
   DBusConnection(#[from] zbus::fdo::Error),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   #[error("Invalid argument: {0}")]
   InvalidArgument(String),

   #[error("No Bluetooth radio available")]
   RadioUnavailable,

   #[error("Session has been torn down")]
   SessionTornDown,

   #[error("Session manager has been shut down")]
   ManagerShutdown,

   #[error("Could not determine config directory")]
   ConfigDirNotFound,

   #[error("TOML parsing error: {0}")]
   TomlParse(#[from] toml::de::Error),

   #[error("TOML serialization error: {0}")]
   TomlSerialize(#[from] toml::ser::Error),
}

impl From<DiscoveryError> for zbus::fdo::Error {
   fn from(err: DiscoveryError) -> Self {
      match err {
         DiscoveryError::InvalidArgument(msg) => Self::InvalidArgs(msg),
         DiscoveryError::DBusConnection(e) => e,
         other => Self::Failed(other.to_string()),
      }
   }
}

/// Convenience type alias for Results with `DiscoveryError`.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
