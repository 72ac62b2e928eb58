//! Discovery session state machine.
//!
//! The session decides when discovery may start, waits for radio-enable and
//! permission outcomes, and feeds found devices into the inventory. It is a
//! plain synchronous object; serialization of events is the job of the
//! owning actor (see [`super::manager`]).

use std::sync::Arc;

use log::{debug, info};

use super::{
   bridge::{Attempt, Round, SessionEvent},
   capability::{CapabilityGate, CapabilityRequirement, Grant},
   device::Device,
   inventory::DeviceInventory,
   platform::{DiscoveryNotifications, PermissionProvider, RadioControl, Subscription},
};
use crate::{
   error::{DiscoveryError, Result},
   event::{DiscoveryEvent, EventSender},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
   #[default]
   Idle,
   AwaitingRadioEnable,
   AwaitingPermission,
   Scanning,
   Stopped,
}

/// Result of a start attempt, surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
   Success,
   RadioDeniedByUser,
   PermissionDenied,
}

pub struct DiscoverySession {
   state: SessionState,
   gate: CapabilityGate,
   inventory: DeviceInventory,
   radio: Arc<dyn RadioControl>,
   notifications: Arc<dyn DiscoveryNotifications>,
   event_tx: EventSender,
   subscription: Option<Subscription>,
   round: Round,
   attempt: Attempt,
   torn_down: bool,
}

impl DiscoverySession {
   pub fn new(
      radio: Arc<dyn RadioControl>,
      permissions: Arc<dyn PermissionProvider>,
      notifications: Arc<dyn DiscoveryNotifications>,
      event_tx: EventSender,
   ) -> Result<Self> {
      if !radio.is_present() {
         return Err(DiscoveryError::RadioUnavailable);
      }
      Ok(Self {
         state: SessionState::Idle,
         gate: CapabilityGate::new(radio.clone(), permissions),
         inventory: DeviceInventory::new(),
         radio,
         notifications,
         event_tx,
         subscription: None,
         round: Round::default(),
         attempt: Attempt::default(),
         torn_down: false,
      })
   }

   pub const fn state(&self) -> SessionState {
      self.state
   }

   pub fn snapshot(&self) -> Vec<Device> {
      self.inventory.snapshot()
   }

   /// Starts a discovery attempt from `Idle` or `Stopped`. While an attempt
   /// is already in progress this is a no-op.
   pub fn request_start(&mut self) -> Result<()> {
      if self.torn_down {
         return Err(DiscoveryError::SessionTornDown);
      }
      match self.state {
         SessionState::Idle | SessionState::Stopped => {
            self.attempt = self.attempt.next();
            debug!("Starting {}", self.attempt);
            self.gate.sync_all();
            self.proceed();
         },
         busy => debug!("Start requested while {busy}, ignoring"),
      }
      Ok(())
   }

   /// Stops scanning, or abandons a pending radio/permission request.
   pub fn request_stop(&mut self) -> Result<()> {
      if self.torn_down {
         return Err(DiscoveryError::SessionTornDown);
      }
      match self.state {
         SessionState::Scanning => {
            self.radio.cancel_discovery();
            self.release_subscription();
            info!("Discovery round {} stopped", self.round);
            self.set_state(SessionState::Stopped);
         },
         SessionState::AwaitingRadioEnable | SessionState::AwaitingPermission => {
            self.gate.cancel_pending();
            info!("Start attempt abandoned while {}", self.state);
            self.set_state(SessionState::Stopped);
         },
         SessionState::Idle | SessionState::Stopped => {},
      }
      Ok(())
   }

   /// Applies one collaborator event. Events that do not fit the current
   /// state (late, duplicate, or from another attempt or round) are dropped.
   pub fn handle(&mut self, event: SessionEvent) {
      if self.torn_down {
         debug!("Session torn down, dropping {event:?}");
         return;
      }
      match (self.state, event) {
         (SessionState::AwaitingRadioEnable, SessionEvent::EnableResult(attempt, true))
            if attempt == self.attempt =>
         {
            info!("Radio enabled");
            self.gate.record(CapabilityRequirement::RadioEnabled, Grant::Granted);
            self.gate.sync(CapabilityRequirement::ScanPermission);
            self.proceed();
         },
         (SessionState::AwaitingRadioEnable, SessionEvent::EnableResult(attempt, false))
            if attempt == self.attempt =>
         {
            info!("Radio enable was refused");
            self.gate.record(CapabilityRequirement::RadioEnabled, Grant::Denied);
            self.finish(Outcome::RadioDeniedByUser);
         },
         (
            SessionState::AwaitingPermission,
            SessionEvent::PermissionResult(attempt, CapabilityRequirement::ScanPermission, outcome),
         ) if attempt == self.attempt => {
            self.gate.record(CapabilityRequirement::ScanPermission, outcome);
            match outcome {
               Grant::Granted => {
                  info!("Scan permission granted");
                  self.begin_scanning();
               },
               Grant::Denied => {
                  info!("Scan permission denied");
                  self.finish(Outcome::PermissionDenied);
               },
            }
         },
         (SessionState::Scanning, SessionEvent::DeviceFound(round, device))
            if round == self.round =>
         {
            let revision = self.inventory.revision();
            let address = device.address_key().clone();
            let result = self.inventory.upsert(device);
            debug!("Device {address}: {result:?}, {} known", self.inventory.len());
            if self.inventory.revision() != revision {
               self.publish_inventory();
            }
         },
         (state, event) => debug!("Dropping {event:?} while {state}"),
      }
   }

   /// Unconditionally stops everything and releases external subscriptions.
   /// Further events are dropped and the session cannot be restarted.
   pub fn teardown(&mut self) {
      if self.torn_down {
         return;
      }
      if self.state == SessionState::Scanning {
         self.radio.cancel_discovery();
      }
      self.release_subscription();
      self.gate.cancel_pending();
      self.torn_down = true;

      let revision = self.inventory.revision();
      self.inventory.clear();
      if self.inventory.revision() != revision {
         self.publish_inventory();
      }
      self.set_state(SessionState::Stopped);
      info!("Discovery session torn down");
   }

   /// Runs the gating sequence: radio first, then permission, then scan.
   fn proceed(&mut self) {
      let missing = self.gate.evaluate();
      if missing.contains(&CapabilityRequirement::RadioEnabled) {
         self.set_state(SessionState::AwaitingRadioEnable);
         self.gate.request(CapabilityRequirement::RadioEnabled, self.attempt);
      } else if missing.contains(&CapabilityRequirement::ScanPermission) {
         self.set_state(SessionState::AwaitingPermission);
         self.gate.request(CapabilityRequirement::ScanPermission, self.attempt);
      } else {
         self.begin_scanning();
      }
   }

   fn begin_scanning(&mut self) {
      self.release_subscription();

      let revision = self.inventory.revision();
      self.inventory.clear();
      if self.inventory.revision() != revision {
         self.publish_inventory();
      }

      self.round = self.round.next();
      self.subscription = Some(self.notifications.subscribe(self.round));
      self.radio.start_discovery();
      info!("Discovery round {} started", self.round);

      self.set_state(SessionState::Scanning);
      self.event_tx.emit(DiscoveryEvent::Outcome(Outcome::Success));
   }

   fn finish(&mut self, outcome: Outcome) {
      self.set_state(SessionState::Stopped);
      self.event_tx.emit(DiscoveryEvent::Outcome(outcome));
   }

   fn release_subscription(&mut self) {
      if let Some(mut subscription) = self.subscription.take() {
         subscription.release();
      }
   }

   fn set_state(&mut self, state: SessionState) {
      if self.state == state {
         return;
      }
      debug!("Session {} -> {state}", self.state);
      self.state = state;
      self.event_tx.emit(DiscoveryEvent::SessionStateChanged(state));
   }

   fn publish_inventory(&self) {
      self
         .event_tx
         .emit(DiscoveryEvent::InventoryChanged(self.inventory.snapshot()));
   }
}

impl Drop for DiscoverySession {
   fn drop(&mut self) {
      self.teardown();
   }
}
