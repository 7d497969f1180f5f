//! Radio ownership and configuration
//!
//! The node has exactly one radio. [`RadioController`] is the only component
//! that touches it; everything else goes through the controller. Hardware
//! access is abstracted behind [`RadioDriver`] so the same controller runs
//! against real firmware bindings or the in-process [`sim::SimulatedRadio`].

mod controller;
mod profile;
pub mod sim;

pub use self::controller::{RadioController, ReceivedFrame};
pub use self::profile::{
    Bandwidth, CodingRate, DataRate, RadioMode, RadioProfile, SpreadingFactor,
};

use std::sync::Arc;

use bytes::Bytes;

use crate::core::Result;
use crate::session::Session;

/// Callback the driver invokes with each received packet.
///
/// Called from whatever context the driver receives in (an interrupt
/// thread, a reader task). It must not block.
pub type ReceiveCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Radio hardware collaborator
pub trait RadioDriver: Send {
    /// Applies a complete set of radio parameters.
    ///
    /// Any packet being received under the previous settings is lost.
    fn configure(&mut self, profile: &RadioProfile) -> Result<()>;

    /// Transmits one packet; returns an error instead of waiting when the
    /// radio is busy.
    fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Installs or removes the receive callback
    fn set_receive_handler(&mut self, handler: Option<ReceiveCallback>);

    /// Puts the radio into its lowest power state
    fn sleep(&mut self) -> Result<()>;

    /// Hands joined-network session state to the radio's network stack.
    ///
    /// Drivers whose joined mode is implemented elsewhere can ignore it.
    fn load_session(&mut self, _session: &Session) -> Result<()> {
        Ok(())
    }
}
