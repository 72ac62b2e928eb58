//! Linux platform collaborators for the discovery session.
//!
//! This module provides the BlueZ radio (power control, discovery and
//! found-device notifications) and the scan-permission provider.

pub mod adapter;
pub mod permission;
