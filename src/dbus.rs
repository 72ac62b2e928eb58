use std::sync::Arc;

use log::info;
use smol_str::SmolStr;
use zbus::{interface, object_server::SignalEmitter};

use crate::{
   bluetooth::permission::PolicyPermissions,
   discovery::{
      capability::{CapabilityRequirement, Grant},
      device::Device,
      manager::DiscoveryManager,
   },
};

pub struct DiscoveryService {
   manager: DiscoveryManager,
   permissions: Arc<PolicyPermissions>,
   unknown_label: SmolStr,
}

impl DiscoveryService {
   pub fn new(
      manager: DiscoveryManager,
      permissions: Arc<PolicyPermissions>,
      unknown_label: impl Into<SmolStr>,
   ) -> Self {
      Self {
         manager,
         permissions,
         unknown_label: unknown_label.into(),
      }
   }
}

/// Serializes an inventory snapshot for the UI.
pub fn devices_json(devices: &[Device], unknown_label: &str) -> String {
   let values: Vec<serde_json::Value> = devices.iter().map(|d| d.to_json(unknown_label)).collect();
   serde_json::Value::Array(values).to_string()
}

#[interface(name = "org.nearscan.Discovery1")]
impl DiscoveryService {
   async fn start_discovery(&self) -> zbus::fdo::Result<String> {
      let state = self.manager.request_start().await?;
      info!("Discovery start requested, session is {state}");
      Ok(state.to_string())
   }

   async fn stop_discovery(&self) -> zbus::fdo::Result<String> {
      let state = self.manager.request_stop().await?;
      info!("Discovery stop requested, session is {state}");
      Ok(state.to_string())
   }

   async fn get_devices(&self) -> zbus::fdo::Result<String> {
      let devices = self.manager.devices().await?;
      Ok(devices_json(&devices, &self.unknown_label))
   }

   async fn get_state(&self) -> zbus::fdo::Result<String> {
      Ok(self.manager.state().await?.to_string())
   }

   async fn resolve_permission(
      &self,
      requirement: String,
      granted: bool,
   ) -> zbus::fdo::Result<bool> {
      let requirement = CapabilityRequirement::parse(&requirement)?;
      self.permissions.resolve(requirement, Grant::from(granted))?;
      Ok(true)
   }

   // Signals
   #[zbus(signal)]
   pub async fn inventory_changed(emitter: &SignalEmitter<'_>, devices: &str) -> zbus::Result<()>;

   #[zbus(signal)]
   pub async fn session_state_changed(
      emitter: &SignalEmitter<'_>,
      state: &str,
   ) -> zbus::Result<()>;

   #[zbus(signal)]
   pub async fn outcome(emitter: &SignalEmitter<'_>, outcome: &str) -> zbus::Result<()>;

   #[zbus(signal)]
   pub async fn permission_requested(
      emitter: &SignalEmitter<'_>,
      requirement: &str,
   ) -> zbus::Result<()>;

   #[zbus(signal)]
   pub async fn permission_withdrawn(
      emitter: &SignalEmitter<'_>,
      requirement: &str,
   ) -> zbus::Result<()>;

   // Properties for polling-free updates, refreshed by the event dispatcher
   #[zbus(property)]
   async fn state(&self) -> zbus::fdo::Result<String> {
      self.get_state().await
   }

   #[zbus(property)]
   async fn device_count(&self) -> zbus::fdo::Result<u32> {
      Ok(self.manager.devices().await?.len() as u32)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_devices_json_uses_label_for_unnamed() {
      let devices = [Device::new("AA:BB", Some("Phone")), Device::new("11:22", None)];
      let parsed: serde_json::Value =
         serde_json::from_str(&devices_json(&devices, "Unknown device")).unwrap();

      assert_eq!(parsed[0]["address"], "AA:BB");
      assert_eq!(parsed[0]["label"], "Phone");
      assert_eq!(parsed[1]["address"], "11:22");
      assert!(parsed[1]["name"].is_null());
      assert_eq!(parsed[1]["label"], "Unknown device");
   }
}
