//! In-memory collaborators for exercising the session without a radio.

use std::sync::{
   Arc,
   atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;

use super::{
   bridge::{Attempt, Round},
   capability::CapabilityRequirement,
   platform::{DiscoveryNotifications, PermissionProvider, RadioControl, Subscription},
   session::{Outcome, SessionState},
};
use crate::event::{DiscoveryEvent, EventBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
   EnableRequest,
   PermissionRequest,
   PermissionWithdraw,
   StartDiscovery,
   CancelDiscovery,
   Subscribe(Round),
   Release(Round),
}

/// Ordered record of every collaborator call.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
   pub fn record(&self, call: Call) {
      self.0.lock().push(call);
   }

   pub fn calls(&self) -> Vec<Call> {
      self.0.lock().clone()
   }

   pub fn count(&self, call: Call) -> usize {
      self.0.lock().iter().filter(|&&c| c == call).count()
   }

   pub fn clear(&self) {
      self.0.lock().clear();
   }
}

pub struct FakeRadio {
   journal: Journal,
   present: bool,
   enabled: AtomicBool,
   asked: Mutex<Option<Attempt>>,
}

impl FakeRadio {
   pub fn new(journal: &Journal, enabled: bool) -> Arc<Self> {
      Arc::new(Self {
         journal: journal.clone(),
         present: true,
         enabled: AtomicBool::new(enabled),
         asked: Mutex::default(),
      })
   }

   pub fn absent(journal: &Journal) -> Arc<Self> {
      Arc::new(Self {
         journal: journal.clone(),
         present: false,
         enabled: AtomicBool::new(false),
         asked: Mutex::default(),
      })
   }

   pub fn set_enabled(&self, enabled: bool) {
      self.enabled.store(enabled, Ordering::SeqCst);
   }

   /// Attempt named by the latest enable request.
   pub fn asked_by(&self) -> Option<Attempt> {
      *self.asked.lock()
   }
}

impl RadioControl for FakeRadio {
   fn is_present(&self) -> bool {
      self.present
   }

   fn is_enabled(&self) -> bool {
      self.enabled.load(Ordering::SeqCst)
   }

   fn request_enable(&self, attempt: Attempt) {
      *self.asked.lock() = Some(attempt);
      self.journal.record(Call::EnableRequest);
   }

   fn start_discovery(&self) {
      self.journal.record(Call::StartDiscovery);
   }

   fn cancel_discovery(&self) {
      self.journal.record(Call::CancelDiscovery);
   }
}

pub struct FakePermissions {
   journal: Journal,
   granted: AtomicBool,
   asked: Mutex<Option<Attempt>>,
}

impl FakePermissions {
   pub fn new(journal: &Journal, granted: bool) -> Arc<Self> {
      Arc::new(Self {
         journal: journal.clone(),
         granted: AtomicBool::new(granted),
         asked: Mutex::default(),
      })
   }

   /// Attempt named by the latest permission request.
   pub fn asked_by(&self) -> Option<Attempt> {
      *self.asked.lock()
   }
}

impl PermissionProvider for FakePermissions {
   fn is_granted(&self, _requirement: CapabilityRequirement) -> bool {
      self.granted.load(Ordering::SeqCst)
   }

   fn request(&self, _requirement: CapabilityRequirement, attempt: Attempt) {
      *self.asked.lock() = Some(attempt);
      self.journal.record(Call::PermissionRequest);
   }

   fn withdraw(&self, _requirement: CapabilityRequirement) {
      self.journal.record(Call::PermissionWithdraw);
   }
}

pub struct FakeNotifications {
   journal: Journal,
   live: Arc<Mutex<Option<Round>>>,
}

impl FakeNotifications {
   pub fn new(journal: &Journal) -> Arc<Self> {
      Arc::new(Self {
         journal: journal.clone(),
         live: Arc::default(),
      })
   }

   /// Round of the currently unreleased subscription, if any.
   pub fn live_round(&self) -> Option<Round> {
      *self.live.lock()
   }
}

impl DiscoveryNotifications for FakeNotifications {
   fn subscribe(&self, round: Round) -> Subscription {
      self.journal.record(Call::Subscribe(round));
      *self.live.lock() = Some(round);

      let journal = self.journal.clone();
      let live = self.live.clone();
      Subscription::new(round, move || {
         journal.record(Call::Release(round));
         let mut live = live.lock();
         if *live == Some(round) {
            *live = None;
         }
      })
   }
}

#[derive(Default)]
pub struct RecordingBus(Mutex<Vec<DiscoveryEvent>>);

impl RecordingBus {
   pub fn new() -> Arc<Self> {
      Arc::default()
   }

   pub fn states(&self) -> Vec<SessionState> {
      self
         .0
         .lock()
         .iter()
         .filter_map(|e| match e {
            DiscoveryEvent::SessionStateChanged(state) => Some(*state),
            _ => None,
         })
         .collect()
   }

   pub fn outcomes(&self) -> Vec<Outcome> {
      self
         .0
         .lock()
         .iter()
         .filter_map(|e| match e {
            DiscoveryEvent::Outcome(outcome) => Some(*outcome),
            _ => None,
         })
         .collect()
   }

   pub fn permission_requests(&self) -> Vec<CapabilityRequirement> {
      self
         .0
         .lock()
         .iter()
         .filter_map(|e| match e {
            DiscoveryEvent::PermissionRequested(req) => Some(*req),
            _ => None,
         })
         .collect()
   }

   pub fn permission_withdrawals(&self) -> Vec<CapabilityRequirement> {
      self
         .0
         .lock()
         .iter()
         .filter_map(|e| match e {
            DiscoveryEvent::PermissionWithdrawn(req) => Some(*req),
            _ => None,
         })
         .collect()
   }

   pub fn inventory_updates(&self) -> usize {
      self
         .0
         .lock()
         .iter()
         .filter(|e| matches!(e, DiscoveryEvent::InventoryChanged(_)))
         .count()
   }
}

impl EventBus for RecordingBus {
   fn emit(&self, event: DiscoveryEvent) {
      self.0.lock().push(event);
   }
}
