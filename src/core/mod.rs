//! Core types shared by every part of the relay node
//!
//! Errors, identities, frames and configuration live here.

pub mod config;
pub mod error;
pub mod serde;
pub mod types;

pub use self::config::{Region, RelayConfig};
pub use self::error::{Error, Result};
pub use self::types::{DeviceRole, Frame, GatewayId, NodeIdentity, TreeLevel};

/// Leading byte of a frame no relay has touched yet
pub const ORIGIN_MARKER: u8 = 64;

/// Deepest supported tree level; hop markers keep levels in one nibble
pub const MAX_TREE_LEVEL: u8 = 15;

/// Default time between the node's own uplinks, in seconds
pub const DEFAULT_UPLINK_PERIOD_SECS: u64 = 7;

/// Largest frame read from the radio in one receive
pub const MAX_FRAME_SIZE: usize = 256;
