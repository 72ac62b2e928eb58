//! Nearby-device discovery D-Bus service
//!
//! This service drives a Bluetooth discovery session on a BlueZ adapter:
//! it gates discovery on radio power and scan permission, keeps a
//! deduplicated inventory of found devices, and publishes state changes
//! over D-Bus.

use std::{sync::Arc, time::Duration};

use crossbeam::queue::SegQueue;
use log::{info, warn};
use smol_str::SmolStr;
use tokio::{signal, sync::Notify, time};
use zbus::{Connection, connection, object_server::InterfaceRef};

use bluetooth::{adapter::BluezRadio, permission::PolicyPermissions};
use dbus::DiscoveryService;
use discovery::{bridge::EventBridge, manager::DiscoveryManager, session::DiscoverySession};
use event::{DiscoveryEvent, EventBus};

mod bluetooth;
mod config;
mod dbus;
mod discovery;
mod error;
mod event;

use crate::{dbus::DiscoveryServiceSignals, error::Result};

const OBJECT_PATH: &str = "/org/nearscan/discovery";

#[tokio::main]
async fn main() -> Result<()> {
   env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

   info!("Starting nearscan D-Bus service...");

   // Load configuration
   let config = config::Config::load()?;
   info!(
      "Loaded configuration (adapter: {}, scan permission: {}, transport: {})",
      config.adapter.as_deref().unwrap_or("default"),
      config.scan_permission,
      config.transport
   );

   // Create event channel
   let event_bus = EventProcessor::new(config.unknown_device_label.as_str());

   // Session queue shared by the collaborators and the session handle
   let (bridge, inbox) = EventBridge::channel();

   let radio = Arc::new(BluezRadio::open(&config, bridge.clone()).await?);
   let permissions = Arc::new(PolicyPermissions::new(
      config.scan_permission,
      bridge.clone(),
      event_bus.clone(),
   ));
   let session = DiscoverySession::new(
      radio.clone(),
      permissions.clone(),
      radio.clone(),
      event_bus.clone(),
   )?;
   info!("Discovery session ready on adapter {}", radio.name());

   let manager = DiscoveryManager::spawn(session, bridge, inbox);

   // Create D-Bus service
   let service = DiscoveryService::new(
      manager.clone(),
      permissions,
      config.unknown_device_label.as_str(),
   );

   // Build D-Bus connection
   let connection = connection::Builder::session()?
      .name("org.nearscan")?
      .serve_at(OBJECT_PATH, service)?
      .build()
      .await?;

   info!("nearscan D-Bus service started at org.nearscan");

   // Start event processor
   event_bus.spawn_dispatcher(connection).await?;

   // Wait for shutdown signal
   signal::ctrl_c().await?;
   info!("Shutting down nearscan service...");
   manager.teardown().await?;

   Ok(())
}

struct EventProcessor {
   queue: SegQueue<DiscoveryEvent>,
   notifier: Notify,
   unknown_label: SmolStr,
}

impl EventProcessor {
   fn new(unknown_label: &str) -> Arc<Self> {
      Arc::new(Self {
         queue: SegQueue::new(),
         notifier: Notify::new(),
         unknown_label: SmolStr::new(unknown_label),
      })
   }
}

impl EventProcessor {
   async fn recv(self: &Arc<Self>) -> Option<DiscoveryEvent> {
      loop {
         if let Some(event) = self.queue.pop() {
            return Some(event);
         }
         let notify = self.notifier.notified();
         if let Some(event) = self.queue.pop() {
            return Some(event);
         }
         if Arc::strong_count(self) == 1 {
            return None;
         }
         let _ = time::timeout(Duration::from_secs(1), notify).await;
      }
   }

   async fn dispatch(
      &self,
      iface: &InterfaceRef<DiscoveryService>,
      event: DiscoveryEvent,
   ) -> Result<()> {
      match event {
         DiscoveryEvent::InventoryChanged(devices) => {
            iface
               .inventory_changed(&dbus::devices_json(&devices, &self.unknown_label))
               .await?;
            iface
               .get()
               .await
               .device_count_changed(iface.signal_emitter())
               .await?;
         },
         DiscoveryEvent::SessionStateChanged(state) => {
            iface.session_state_changed(state.into()).await?;
            iface.get().await.state_changed(iface.signal_emitter()).await?;
         },
         DiscoveryEvent::Outcome(outcome) => {
            iface.outcome(outcome.into()).await?;
         },
         DiscoveryEvent::PermissionRequested(requirement) => {
            iface.permission_requested(requirement.into()).await?;
         },
         DiscoveryEvent::PermissionWithdrawn(requirement) => {
            iface.permission_withdrawn(requirement.into()).await?;
         },
      }
      Ok(())
   }

   async fn spawn_dispatcher(self: Arc<Self>, connection: Connection) -> Result<()> {
      let iface = connection
         .object_server()
         .interface::<_, DiscoveryService>(OBJECT_PATH)
         .await?;
      tokio::spawn(async move {
         while let Some(event) = self.recv().await {
            if let Err(e) = self.dispatch(&iface, event).await {
               warn!("Error dispatching event: {e}");
            }
         }
      });

      Ok(())
   }
}

impl EventBus for EventProcessor {
   fn emit(&self, event: DiscoveryEvent) {
      self.queue.push(event);
      self.notifier.notify_waiters();
   }
}
