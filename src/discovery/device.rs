//! Discovered device entity.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use smol_str::SmolStr;

/// Found-device payload as reported by the radio stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDevice {
   pub address: SmolStr,
   pub name: Option<SmolStr>,
   pub rssi: Option<i16>,
}

impl RawDevice {
   pub fn new(address: impl Into<SmolStr>, name: Option<&str>) -> Self {
      Self {
         address: address.into(),
         name: name.map(SmolStr::new),
         rssi: None,
      }
   }

   #[must_use]
   pub fn with_rssi(mut self, rssi: i16) -> Self {
      self.rssi = Some(rssi);
      self
   }
}

/// A device seen during discovery. Identity is the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
   address: SmolStr,
   display_name: Option<SmolStr>,
   first_seen_at: SystemTime,
   rssi: Option<i16>,
}

impl Device {
   #[cfg(test)]
   pub fn new(address: impl Into<SmolStr>, display_name: Option<&str>) -> Self {
      Self {
         address: address.into(),
         display_name: display_name.map(SmolStr::new),
         first_seen_at: SystemTime::now(),
         rssi: None,
      }
   }

   /// Translates a raw payload. Blank names become absent, and a payload
   /// without an address yields `None`.
   pub fn from_raw(raw: RawDevice) -> Option<Self> {
      let address = SmolStr::new(raw.address.trim());
      if address.is_empty() {
         return None;
      }
      let display_name = raw
         .name
         .map(|name| SmolStr::new(name.trim()))
         .filter(|name| !name.is_empty());
      Some(Self {
         address,
         display_name,
         first_seen_at: SystemTime::now(),
         rssi: raw.rssi,
      })
   }

   pub fn address(&self) -> &str {
      &self.address
   }

   pub(crate) const fn address_key(&self) -> &SmolStr {
      &self.address
   }

   pub fn display_name(&self) -> Option<&str> {
      self.display_name.as_deref()
   }

   pub const fn first_seen_at(&self) -> SystemTime {
      self.first_seen_at
   }

   pub const fn rssi(&self) -> Option<i16> {
      self.rssi
   }

   /// Merges a repeated sighting into this entry. Only an absent name is
   /// filled in; RSSI is last-writer-wins. Returns whether anything changed.
   pub(crate) fn absorb(&mut self, sighting: Self) -> bool {
      let mut changed = false;
      if self.display_name.is_none() && sighting.display_name.is_some() {
         self.display_name = sighting.display_name;
         changed = true;
      }
      if sighting.rssi.is_some() && sighting.rssi != self.rssi {
         self.rssi = sighting.rssi;
         changed = true;
      }
      changed
   }

   /// Name to present, falling back to `placeholder` for unnamed devices.
   pub fn label<'a>(&'a self, placeholder: &'a str) -> &'a str {
      self.display_name().unwrap_or(placeholder)
   }

   pub fn to_json(&self, placeholder: &str) -> serde_json::Value {
      let first_seen = self
         .first_seen_at()
         .duration_since(UNIX_EPOCH)
         .map_or(0, |d| d.as_secs());
      json!({
         "address": self.address.as_str(),
         "name": self.display_name(),
         "label": self.label(placeholder),
         "first_seen": first_seen,
         "rssi": self.rssi(),
      })
   }
}
