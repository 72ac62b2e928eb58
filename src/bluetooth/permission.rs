//! Scan-permission provider for Linux.
//!
//! BlueZ has no per-application scan permission, so the grant is decided
//! by configuration: always granted, always denied, or asked of the UI over
//! D-Bus. Fixed policies cannot be overridden from D-Bus.

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
   discovery::{
      bridge::{Attempt, EventBridge},
      capability::{CapabilityRequirement, Grant},
      platform::PermissionProvider,
   },
   error::{DiscoveryError, Result},
   event::{DiscoveryEvent, EventSender},
};

/// How scan-permission requests are answered.
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
pub enum PermissionPolicy {
   Granted,
   Denied,
   #[default]
   Prompt,
}

pub struct PolicyPermissions {
   policy: PermissionPolicy,
   // a UI grant is remembered for the process lifetime
   granted: AtomicBool,
   // attempt whose prompt the UI has not answered yet
   prompt: Mutex<Option<Attempt>>,
   bridge: EventBridge,
   event_tx: EventSender,
}

impl PolicyPermissions {
   pub fn new(policy: PermissionPolicy, bridge: EventBridge, event_tx: EventSender) -> Self {
      Self {
         policy,
         granted: AtomicBool::new(false),
         prompt: Mutex::new(None),
         bridge,
         event_tx,
      }
   }

   /// Answer from the UI to an open `PermissionRequested` prompt. Only the
   /// `prompt` policy raises prompts; without one outstanding the answer is
   /// rejected and changes nothing.
   pub fn resolve(&self, requirement: CapabilityRequirement, outcome: Grant) -> Result<()> {
      if requirement != CapabilityRequirement::ScanPermission {
         return Err(DiscoveryError::InvalidArgument(format!(
            "{requirement} is not a permission"
         )));
      }
      if self.policy != PermissionPolicy::Prompt {
         return Err(DiscoveryError::InvalidArgument(format!(
            "{requirement} is fixed to {} by configuration",
            self.policy
         )));
      }
      let Some(attempt) = self.prompt.lock().take() else {
         return Err(DiscoveryError::InvalidArgument(format!(
            "no {requirement} prompt is outstanding"
         )));
      };
      info!("UI resolved {requirement} for {attempt}: {outcome}");
      if outcome == Grant::Granted {
         self.granted.store(true, Ordering::Release);
      }
      self.bridge.permission_result(attempt, requirement, outcome);
      Ok(())
   }
}

impl PermissionProvider for PolicyPermissions {
   fn is_granted(&self, requirement: CapabilityRequirement) -> bool {
      if requirement != CapabilityRequirement::ScanPermission {
         return false;
      }
      match self.policy {
         PermissionPolicy::Granted => true,
         PermissionPolicy::Denied => false,
         PermissionPolicy::Prompt => self.granted.load(Ordering::Acquire),
      }
   }

   fn request(&self, requirement: CapabilityRequirement, attempt: Attempt) {
      match self.policy {
         PermissionPolicy::Granted => {
            self.bridge.permission_result(attempt, requirement, Grant::Granted);
         },
         PermissionPolicy::Denied => {
            info!("{requirement} denied by configuration");
            self.bridge.permission_result(attempt, requirement, Grant::Denied);
         },
         PermissionPolicy::Prompt => {
            info!("Asking UI for {requirement}");
            *self.prompt.lock() = Some(attempt);
            self.event_tx.emit(DiscoveryEvent::PermissionRequested(requirement));
         },
      }
   }

   fn withdraw(&self, requirement: CapabilityRequirement) {
      if self.prompt.lock().take().is_some() {
         info!("Withdrawing {requirement} prompt");
         self.event_tx.emit(DiscoveryEvent::PermissionWithdrawn(requirement));
      }
   }
}
