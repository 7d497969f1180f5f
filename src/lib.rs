//! Tree relay: hop relaying and single-radio mode coordination for
//! tree-shaped LoRa networks
//!
//! A relay node forwards packets one level up a fixed-depth tree towards a
//! collector and, optionally, sends its own periodic uplinks as a joined
//! network node, sharing one physical radio between the two jobs.
pub mod coordinator;
pub mod core;
pub mod radio;
pub mod relay;
pub mod session;
pub mod uplink;
pub mod util;

// Re-export commonly used items
pub use crate::coordinator::{ModeCoordinator, Phase, StateInfo};
pub use crate::core::{Error, RelayConfig, Result};
pub use crate::relay::{HopRelay, RelayDecision};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
