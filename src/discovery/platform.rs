//! Collaborator contracts the discovery session depends on.
//!
//! Results of `request_enable` and `PermissionProvider::request` are not
//! returned; implementations deliver them later, tagged with the requesting
//! [`Attempt`], through the [`EventBridge`](super::bridge::EventBridge) they
//! were built with.

use std::fmt;

use super::{
   bridge::{Attempt, Round},
   capability::CapabilityRequirement,
};

/// Control surface of the radio adapter.
pub trait RadioControl: Send + Sync {
   /// Whether radio hardware is present at all.
   fn is_present(&self) -> bool {
      true
   }

   fn is_enabled(&self) -> bool;

   /// Asks for the radio to be switched on. Outcome arrives as an
   /// `enable_result` event for `attempt`.
   fn request_enable(&self, attempt: Attempt);

   fn start_discovery(&self);

   fn cancel_discovery(&self);
}

/// Platform permission workflow.
pub trait PermissionProvider: Send + Sync {
   fn is_granted(&self, requirement: CapabilityRequirement) -> bool;

   /// Starts the grant workflow. Outcome arrives as a `permission_result`
   /// event for `attempt`.
   fn request(&self, requirement: CapabilityRequirement, attempt: Attempt);

   /// Abandons an outstanding request; its outcome is no longer awaited.
   fn withdraw(&self, requirement: CapabilityRequirement);
}

/// Source of found-device notifications.
pub trait DiscoveryNotifications: Send + Sync {
   /// Delivers found devices tagged with `round` until the returned
   /// subscription is released.
   fn subscribe(&self, round: Round) -> Subscription;
}

/// Scoped found-device subscription. Released explicitly or on drop,
/// whichever comes first; releasing twice is a no-op.
pub struct Subscription {
   round: Round,
   release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
   pub fn new(round: Round, release: impl FnOnce() + Send + 'static) -> Self {
      Self {
         round,
         release: Some(Box::new(release)),
      }
   }

   pub const fn is_active(&self) -> bool {
      self.release.is_some()
   }

   pub fn release(&mut self) {
      if let Some(release) = self.release.take() {
         release();
      }
   }
}

impl Drop for Subscription {
   fn drop(&mut self) {
      self.release();
   }
}

impl fmt::Debug for Subscription {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Subscription")
         .field("round", &self.round)
         .field("active", &self.is_active())
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use std::sync::{
      Arc,
      atomic::{AtomicUsize, Ordering},
   };

   use super::*;

   #[test]
   fn test_release_runs_once() {
      let released = Arc::new(AtomicUsize::new(0));
      let counter = released.clone();
      let mut sub = Subscription::new(Round::default(), move || {
         counter.fetch_add(1, Ordering::SeqCst);
      });

      assert!(sub.is_active());
      sub.release();
      sub.release();
      assert!(!sub.is_active());
      drop(sub);
      assert_eq!(released.load(Ordering::SeqCst), 1);
   }

   #[test]
   fn test_drop_releases() {
      let released = Arc::new(AtomicUsize::new(0));
      let counter = released.clone();
      drop(Subscription::new(Round::default(), move || {
         counter.fetch_add(1, Ordering::SeqCst);
      }));
      assert_eq!(released.load(Ordering::SeqCst), 1);
   }
}
