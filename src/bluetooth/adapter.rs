//! BlueZ-backed radio for the discovery session.
//!
//! Wraps one `bluer` adapter: tracks its power state, powers it on when
//! asked, keeps a discovery stream alive while scanning, and forwards every
//! reported device to the session for the currently subscribed round.

use std::sync::{
   Arc, Weak,
   atomic::{AtomicBool, Ordering},
};

use bluer::{Adapter, AdapterEvent, AdapterProperty, Address, DiscoveryFilter, Session};
use crossbeam::atomic::AtomicCell;
use futures::{StreamExt, pin_mut};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use smol_str::SmolStr;
use tokio::{runtime::Handle, task::JoinHandle};

use crate::{
   config::{Config, ScanTransport},
   discovery::{
      bridge::{Attempt, EventBridge, Round},
      device::RawDevice,
      platform::{DiscoveryNotifications, RadioControl, Subscription},
   },
   error::{DiscoveryError, Result},
};

struct RadioInner {
   adapter: Adapter,
   name: SmolStr,
   transport: ScanTransport,
   bridge: EventBridge,
   runtime: Handle,
   present: AtomicBool,
   powered: AtomicBool,
   // round of the live subscription
   round: AtomicCell<Option<Round>>,
   discovery: Mutex<Option<JoinHandle<()>>>,
   monitor: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for RadioInner {
   fn drop(&mut self) {
      if let Some(handle) = self.discovery.get_mut().take() {
         handle.abort();
      }
      if let Some(handle) = self.monitor.get_mut().take() {
         handle.abort();
      }
   }
}

/// Radio collaborator backed by a BlueZ adapter.
pub struct BluezRadio {
   inner: Arc<RadioInner>,
}

impl BluezRadio {
   /// Opens the configured adapter, or the default one. Fails with
   /// `RadioUnavailable` when there is no usable adapter.
   pub async fn open(config: &Config, bridge: EventBridge) -> Result<Self> {
      let session = Session::new().await?;
      let adapter = match config.adapter.as_deref() {
         Some(name) => session.adapter(name),
         None => session.default_adapter().await,
      }
      .map_err(|e| {
         error!("Failed to open Bluetooth adapter: {e}");
         DiscoveryError::RadioUnavailable
      })?;

      // Fails when the adapter object does not exist
      let powered = adapter.is_powered().await.map_err(|e| {
         error!("Adapter {} is not usable: {e}", adapter.name());
         DiscoveryError::RadioUnavailable
      })?;

      let name = SmolStr::new(adapter.name());
      info!("Using adapter {name} (powered: {powered})");

      let inner = Arc::new(RadioInner {
         adapter: adapter.clone(),
         name,
         transport: config.transport,
         bridge,
         runtime: Handle::current(),
         present: AtomicBool::new(true),
         powered: AtomicBool::new(powered),
         round: AtomicCell::new(None),
         discovery: Mutex::new(None),
         monitor: Mutex::new(None),
      });

      let monitor = tokio::spawn(monitor_adapter(adapter, Arc::downgrade(&inner)));
      *inner.monitor.lock() = Some(monitor);

      Ok(Self { inner })
   }

   pub fn name(&self) -> &str {
      &self.inner.name
   }
}

impl RadioControl for BluezRadio {
   fn is_present(&self) -> bool {
      self.inner.present.load(Ordering::Acquire)
   }

   fn is_enabled(&self) -> bool {
      self.inner.powered.load(Ordering::Acquire)
   }

   fn request_enable(&self, attempt: Attempt) {
      let inner = self.inner.clone();
      self.inner.runtime.spawn(async move {
         match inner.adapter.set_powered(true).await {
            Ok(()) => {
               info!("Powered on adapter: {}", inner.name);
               inner.powered.store(true, Ordering::Release);
               inner.bridge.enable_result(attempt, true);
            },
            Err(e) => {
               warn!("Failed to power on adapter {}: {e}", inner.name);
               inner.bridge.enable_result(attempt, false);
            },
         }
      });
   }

   fn start_discovery(&self) {
      let task = self.inner.runtime.spawn(run_discovery(
         self.inner.adapter.clone(),
         self.inner.transport,
         Arc::downgrade(&self.inner),
      ));
      if let Some(previous) = self.inner.discovery.lock().replace(task) {
         previous.abort();
      }
   }

   fn cancel_discovery(&self) {
      if let Some(task) = self.inner.discovery.lock().take() {
         // Dropping the discovery stream ends the BlueZ discovery session
         task.abort();
         debug!("Discovery cancelled on {}", self.inner.name);
      }
   }
}

impl DiscoveryNotifications for BluezRadio {
   fn subscribe(&self, round: Round) -> Subscription {
      self.inner.round.store(Some(round));
      let inner = Arc::downgrade(&self.inner);
      Subscription::new(round, move || {
         if let Some(inner) = inner.upgrade() {
            let _ = inner.round.compare_exchange(Some(round), None);
         }
      })
   }
}

impl RadioInner {
   /// Reads the reported device. `None` when it is only known from BlueZ's
   /// cache and was not actually heard in this round.
   async fn describe(&self, addr: Address) -> Option<RawDevice> {
      let device = self.adapter.device(addr).ok()?;
      let name = device.name().await.ok().flatten();
      let rssi = device.rssi().await.ok().flatten();
      live_sighting(addr, name.as_deref(), rssi)
   }
}

/// Cached and paired devices are reported without RSSI until they are
/// heard again; only devices with a signal reading count as found.
fn live_sighting(addr: Address, name: Option<&str>, rssi: Option<i16>) -> Option<RawDevice> {
   let rssi = rssi?;
   Some(RawDevice::new(addr.to_string(), name).with_rssi(rssi))
}

async fn monitor_adapter(adapter: Adapter, inner: Weak<RadioInner>) {
   let events = match adapter.events().await {
      Ok(events) => events,
      Err(e) => {
         warn!("Failed to get events for adapter {}: {e}", adapter.name());
         return;
      },
   };
   pin_mut!(events);

   while let Some(event) = events.next().await {
      let Some(inner) = inner.upgrade() else {
         return;
      };
      if let AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered)) = event {
         debug!("Adapter {} powered: {powered}", inner.name);
         inner.powered.store(powered, Ordering::Release);
      }
   }

   // If we exit the event loop, adapter is probably gone
   if let Some(inner) = inner.upgrade() {
      warn!("Adapter lost: {}", inner.name);
      inner.present.store(false, Ordering::Release);
      inner.powered.store(false, Ordering::Release);
   }
}

async fn run_discovery(adapter: Adapter, transport: ScanTransport, inner: Weak<RadioInner>) {
   let filter = DiscoveryFilter {
      transport: transport.into(),
      ..Default::default()
   };
   if let Err(e) = adapter.set_discovery_filter(filter).await {
      warn!("Failed to set {transport} discovery filter: {e}");
   }

   let events = match adapter.discover_devices_with_changes().await {
      Ok(events) => events,
      Err(e) => {
         warn!("Failed to start discovery on {}: {e}", adapter.name());
         return;
      },
   };
   pin_mut!(events);

   while let Some(event) = events.next().await {
      let AdapterEvent::DeviceAdded(addr) = event else {
         continue;
      };
      let Some(inner) = inner.upgrade() else {
         return;
      };
      if inner.bridge.is_closed() {
         debug!("Session gone, ending discovery on {}", inner.name);
         return;
      }
      let Some(round) = inner.round.load() else {
         trace!("No subscriber for {addr}");
         continue;
      };
      let Some(raw) = inner.describe(addr).await else {
         trace!("{addr} not in range");
         continue;
      };
      inner.bridge.device_found(round, raw);
   }
   debug!("Discovery stream on {} ended", adapter.name());
}

#[cfg(test)]
mod tests {
   use super::*;

   const ADDR: Address = Address([0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33]);

   #[test]
   fn test_cached_device_without_signal_is_skipped() {
      assert_eq!(live_sighting(ADDR, Some("Headphones"), None), None);
   }

   #[test]
   fn test_heard_device_is_reported() {
      let raw = live_sighting(ADDR, Some("Headphones"), Some(-61)).unwrap();
      assert_eq!(raw.address.as_str(), "AA:BB:CC:11:22:33");
      assert_eq!(raw.name.as_deref(), Some("Headphones"));
      assert_eq!(raw.rssi, Some(-61));
   }
}
