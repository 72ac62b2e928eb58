//! Discovery session core.
//!
//! This module contains the platform-independent part of the service: the
//! device inventory, capability gating, the session state machine and the
//! actor that serializes all events into it.

pub mod bridge;
pub mod capability;
pub mod device;
pub mod inventory;
pub mod manager;
pub mod platform;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
