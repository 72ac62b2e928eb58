//! Event handling system for discovery status updates.
//!
//! This module provides the event infrastructure for notifying the UI layer
//! about inventory changes, session state transitions, outcomes of start
//! attempts and permission prompts being raised or withdrawn.

use std::sync::Arc;

use crate::discovery::{
   capability::CapabilityRequirement,
   device::Device,
   session::{Outcome, SessionState},
};

/// Events that can be emitted by the discovery service.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
   InventoryChanged(Vec<Device>),
   SessionStateChanged(SessionState),
   Outcome(Outcome),
   PermissionRequested(CapabilityRequirement),
   /// A prompt raised by `PermissionRequested` is no longer awaited.
   PermissionWithdrawn(CapabilityRequirement),
}

/// Trait for implementing event emission.
pub trait EventBus: Send + Sync {
   /// Emits an event to all registered listeners.
   fn emit(&self, event: DiscoveryEvent);
}

/// Type alias for a thread-safe event sender.
pub type EventSender = Arc<dyn EventBus>;
