//! Adapter from asynchronous platform notifications to session events.
//!
//! Every notification becomes exactly one message on the session's ordered
//! queue. Once the session actor is gone, notifications are discarded.

use std::fmt;

use log::{debug, trace};
use tokio::sync::mpsc;

use super::{
   capability::{CapabilityRequirement, Grant},
   device::{Device, RawDevice},
   manager::Command,
};

/// Identifies one discovery round. Found-device events are tagged with the
/// round whose subscription produced them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Round(u64);

impl Round {
   #[must_use]
   pub const fn next(self) -> Self {
      Self(self.0 + 1)
   }
}

impl fmt::Display for Round {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "#{}", self.0)
   }
}

/// Identifies one start attempt. Radio-enable and permission outcomes carry
/// the attempt that requested them, so answers to an abandoned attempt are
/// not applied to a later one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attempt(u64);

impl Attempt {
   #[must_use]
   pub const fn next(self) -> Self {
      Self(self.0 + 1)
   }
}

impl fmt::Display for Attempt {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "attempt {}", self.0)
   }
}

/// Events delivered to the discovery session by its collaborators.
#[derive(Debug, Clone)]
pub enum SessionEvent {
   EnableResult(Attempt, bool),
   PermissionResult(Attempt, CapabilityRequirement, Grant),
   DeviceFound(Round, Device),
}

pub type Inbox = mpsc::UnboundedReceiver<Command>;

/// Sending half of the session queue.
#[derive(Clone)]
pub struct EventBridge {
   tx: mpsc::UnboundedSender<Command>,
}

impl EventBridge {
   pub fn channel() -> (Self, Inbox) {
      let (tx, rx) = mpsc::unbounded_channel();
      (Self { tx }, rx)
   }

   pub fn enable_result(&self, attempt: Attempt, success: bool) {
      self.deliver(SessionEvent::EnableResult(attempt, success));
   }

   pub fn permission_result(
      &self,
      attempt: Attempt,
      requirement: CapabilityRequirement,
      outcome: Grant,
   ) {
      self.deliver(SessionEvent::PermissionResult(attempt, requirement, outcome));
   }

   pub fn device_found(&self, round: Round, raw: RawDevice) {
      let Some(device) = Device::from_raw(raw) else {
         debug!("Dropping found-device payload without address");
         return;
      };
      self.deliver(SessionEvent::DeviceFound(round, device));
   }

   fn deliver(&self, event: SessionEvent) {
      if !self.send(Command::Event(event)) {
         trace!("Session gone, notification discarded");
      }
   }

   /// Queues a command; `false` if the receiving actor is gone.
   pub(crate) fn send(&self, cmd: Command) -> bool {
      self.tx.send(cmd).is_ok()
   }

   pub fn is_closed(&self) -> bool {
      self.tx.is_closed()
   }
}
