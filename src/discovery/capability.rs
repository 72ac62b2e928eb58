//! Precondition tracking for starting discovery.
//!
//! The gate records which capabilities (radio power, scan permission) are
//! granted, forwards requests for missing ones to the collaborators and
//! collapses duplicate requests while one is outstanding.

use std::{str::FromStr, sync::Arc};

use log::debug;
use smallvec::SmallVec;
use strum::IntoEnumIterator;

use super::{
   bridge::Attempt,
   platform::{PermissionProvider, RadioControl},
};
use crate::error::{DiscoveryError, Result};

/// A precondition that must hold before discovery may start.
#[derive(
   Debug,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Hash,
   strum::Display,
   strum::EnumString,
   strum::EnumIter,
   strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum CapabilityRequirement {
   RadioEnabled,
   ScanPermission,
}

impl CapabilityRequirement {
   pub const COUNT: usize = 2;

   const fn index(self) -> usize {
      self as usize
   }

   /// Parses a requirement name coming from outside the process.
   pub fn parse(name: &str) -> Result<Self> {
      Self::from_str(name)
         .map_err(|_| DiscoveryError::InvalidArgument(format!("unknown requirement: {name}")))
   }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum CapabilityStatus {
   #[default]
   Unknown,
   Granted,
   Denied,
}

/// Outcome of a grant workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Grant {
   Granted,
   Denied,
}

impl From<bool> for Grant {
   fn from(granted: bool) -> Self {
      if granted { Self::Granted } else { Self::Denied }
   }
}

impl From<Grant> for CapabilityStatus {
   fn from(grant: Grant) -> Self {
      match grant {
         Grant::Granted => Self::Granted,
         Grant::Denied => Self::Denied,
      }
   }
}

pub type Missing = SmallVec<[CapabilityRequirement; CapabilityRequirement::COUNT]>;

pub struct CapabilityGate {
   radio: Arc<dyn RadioControl>,
   permissions: Arc<dyn PermissionProvider>,
   states: [CapabilityStatus; CapabilityRequirement::COUNT],
   pending: [bool; CapabilityRequirement::COUNT],
}

impl CapabilityGate {
   pub fn new(radio: Arc<dyn RadioControl>, permissions: Arc<dyn PermissionProvider>) -> Self {
      Self {
         radio,
         permissions,
         states: [CapabilityStatus::Unknown; CapabilityRequirement::COUNT],
         pending: [false; CapabilityRequirement::COUNT],
      }
   }

   pub const fn status(&self, requirement: CapabilityRequirement) -> CapabilityStatus {
      self.states[requirement.index()]
   }

   /// Requirements not yet granted, radio first.
   pub fn evaluate(&self) -> Missing {
      CapabilityRequirement::iter()
         .filter(|&req| self.status(req) != CapabilityStatus::Granted)
         .collect()
   }

   /// Pulls the current answer from the owning collaborator. A collaborator
   /// reporting "granted" wins; a lost grant falls back to `Unknown`, while a
   /// recorded denial is kept until the next explicit outcome.
   pub fn sync(&mut self, requirement: CapabilityRequirement) {
      let granted = match requirement {
         CapabilityRequirement::RadioEnabled => self.radio.is_enabled(),
         CapabilityRequirement::ScanPermission => self.permissions.is_granted(requirement),
      };
      let state = &mut self.states[requirement.index()];
      if granted {
         *state = CapabilityStatus::Granted;
      } else if *state == CapabilityStatus::Granted {
         *state = CapabilityStatus::Unknown;
      }
   }

   pub fn sync_all(&mut self) {
      for req in CapabilityRequirement::iter() {
         self.sync(req);
      }
   }

   /// Starts the grant workflow for `requirement` on behalf of `attempt`.
   /// Returns `false` when a request for it is already outstanding.
   pub fn request(&mut self, requirement: CapabilityRequirement, attempt: Attempt) -> bool {
      if self.is_pending(requirement) {
         debug!("Request for {requirement} already pending");
         return false;
      }
      self.pending[requirement.index()] = true;
      match requirement {
         CapabilityRequirement::RadioEnabled => self.radio.request_enable(attempt),
         CapabilityRequirement::ScanPermission => self.permissions.request(requirement, attempt),
      }
      true
   }

   /// Stores a grant outcome. Last write wins.
   pub fn record(&mut self, requirement: CapabilityRequirement, outcome: Grant) {
      self.pending[requirement.index()] = false;
      self.states[requirement.index()] = outcome.into();
   }

   pub const fn is_pending(&self, requirement: CapabilityRequirement) -> bool {
      self.pending[requirement.index()]
   }

   /// Forgets outstanding requests; their outcomes are no longer awaited.
   /// An open permission prompt is withdrawn. A power-on already sent to
   /// the radio cannot be recalled.
   pub fn cancel_pending(&mut self) {
      if self.is_pending(CapabilityRequirement::ScanPermission) {
         self.permissions.withdraw(CapabilityRequirement::ScanPermission);
      }
      self.pending = [false; CapabilityRequirement::COUNT];
   }
}
