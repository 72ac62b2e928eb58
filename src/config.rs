//! Configuration management for the discovery service.
//!
//! This module handles loading and saving configuration from disk,
//! including adapter selection, the scan-permission policy and the
//! discovery transport.

use std::{
   env, fs,
   path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
   bluetooth::permission::PermissionPolicy,
   error::{DiscoveryError, Result},
};

/// Main configuration structure for the service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
   /// BlueZ adapter to drive (`hci0`, ...). The default adapter when unset.
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub adapter: Option<String>,

   #[serde(default)]
   pub scan_permission: PermissionPolicy,

   #[serde(default)]
   pub transport: ScanTransport,

   /// Label shown for devices that never advertised a name.
   #[serde(default = "default_unknown_device_label")]
   pub unknown_device_label: String,
}

/// Radio transports a discovery round may use.
#[derive(
   Debug,
   Clone,
   Copy,
   Default,
   PartialEq,
   Eq,
   Serialize,
   Deserialize,
   strum::Display,
   strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanTransport {
   #[default]
   Auto,
   Le,
   Bredr,
}

impl From<ScanTransport> for bluer::DiscoveryTransport {
   fn from(transport: ScanTransport) -> Self {
      match transport {
         ScanTransport::Auto => Self::Auto,
         ScanTransport::Le => Self::Le,
         ScanTransport::Bredr => Self::BrEdr,
      }
   }
}

fn default_unknown_device_label() -> String {
   "Unknown device".to_string()
}

impl Default for Config {
   fn default() -> Self {
      Self {
         adapter: None,
         scan_permission: PermissionPolicy::default(),
         transport: ScanTransport::default(),
         unknown_device_label: default_unknown_device_label(),
      }
   }
}

impl Config {
   /// Loads configuration from disk or creates default if not exists.
   pub fn load() -> Result<Self> {
      Self::load_from(&Self::config_path()?)
   }

   /// Loads configuration from `path`, writing the defaults there first if
   /// the file does not exist yet.
   pub fn load_from(path: &Path) -> Result<Self> {
      if path.exists() {
         let contents = fs::read_to_string(path)?;
         Ok(toml::from_str(&contents)?)
      } else {
         let config = Self::default();
         config.save_to(path)?;
         Ok(config)
      }
   }

   /// Saves the current configuration to `path`.
   pub fn save_to(&self, path: &Path) -> Result<()> {
      // Ensure directory exists
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent)?;
      }

      let contents = toml::to_string_pretty(self)?;
      fs::write(path, contents)?;

      Ok(())
   }

   fn config_path() -> Result<PathBuf> {
      let config_dir = if let Ok(home) = env::var("NEARSCAN_HOME") {
         PathBuf::from(home)
      } else if let Some(config_dir) = dirs::config_dir() {
         config_dir.join("nearscan")
      } else {
         return Err(DiscoveryError::ConfigDirNotFound);
      };

      Ok(config_dir.join("config.toml"))
   }
}

#[cfg(test)]
mod tests {
   use tempfile::TempDir;

   use super::*;

   #[test]
   fn test_empty_file_uses_defaults() {
      let config: Config = toml::from_str("").unwrap();
      assert_eq!(config, Config::default());
      assert_eq!(config.scan_permission, PermissionPolicy::Prompt);
      assert_eq!(config.transport, ScanTransport::Auto);
      assert_eq!(config.unknown_device_label, "Unknown device");
   }

   #[test]
   fn test_parse_overrides() {
      let config: Config = toml::from_str(
         r#"
            adapter = "hci1"
            scan_permission = "granted"
            transport = "le"
            unknown_device_label = "???"
         "#,
      )
      .unwrap();
      assert_eq!(config.adapter.as_deref(), Some("hci1"));
      assert_eq!(config.scan_permission, PermissionPolicy::Granted);
      assert_eq!(config.transport, ScanTransport::Le);
      assert_eq!(config.unknown_device_label, "???");
   }

   #[test]
   fn test_unknown_policy_is_rejected() {
      let parsed = toml::from_str::<Config>(r#"scan_permission = "maybe""#);
      assert!(parsed.is_err());
   }

   #[test]
   fn test_load_creates_default_file() -> Result<()> {
      let dir = TempDir::new()?;
      let path = dir.path().join("nested").join("config.toml");

      let config = Config::load_from(&path)?;
      assert_eq!(config, Config::default());
      assert!(path.exists());

      let mut changed = config;
      changed.transport = ScanTransport::Bredr;
      changed.save_to(&path)?;
      assert_eq!(Config::load_from(&path)?.transport, ScanTransport::Bredr);
      Ok(())
   }
}
