//! Deduplicated, first-seen ordered collection of discovered devices.

use std::collections::HashMap;

use smol_str::SmolStr;

use super::device::Device;

/// Result of inserting a sighting into the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
   Inserted,
   Updated,
}

#[derive(Debug, Default)]
pub struct DeviceInventory {
   devices: Vec<Device>,
   index: HashMap<SmolStr, usize>,
   // bumped on every observable change
   revision: u64,
}

impl DeviceInventory {
   pub fn new() -> Self {
      Self::default()
   }

   /// Inserts an unseen address at the end, or merges a repeated sighting
   /// into the existing entry (address and first-seen time never change).
   pub fn upsert(&mut self, device: Device) -> UpsertResult {
      if let Some(&idx) = self.index.get(device.address_key()) {
         if self.devices[idx].absorb(device) {
            self.revision += 1;
         }
         UpsertResult::Updated
      } else {
         self.index.insert(device.address_key().clone(), self.devices.len());
         self.devices.push(device);
         self.revision += 1;
         UpsertResult::Inserted
      }
   }

   pub fn clear(&mut self) {
      if self.is_empty() {
         return;
      }
      self.devices.clear();
      self.index.clear();
      self.revision += 1;
   }

   /// Owned copy of the current contents in first-seen order.
   pub fn snapshot(&self) -> Vec<Device> {
      self.devices.clone()
   }

   #[cfg(test)]
   pub fn get(&self, address: &str) -> Option<&Device> {
      self.index.get(address).map(|&idx| &self.devices[idx])
   }

   pub fn len(&self) -> usize {
      self.devices.len()
   }

   pub fn is_empty(&self) -> bool {
      self.devices.is_empty()
   }

   pub const fn revision(&self) -> u64 {
      self.revision
   }
}
