//! The node's own periodic uplinks
//!
//! [`UplinkScheduler`] owns the uplink counter and builds each payload;
//! [`PeriodicTimer`] decides when. The coordinator sits between them and
//! grants the scheduler the radio for exactly one transmission per tick.

mod timer;

pub use self::timer::{PeriodicTimer, TimerHandle};

use std::time::Duration;

use tracing::{info, warn};

use crate::core::{Error, Result, DEFAULT_UPLINK_PERIOD_SECS};
use crate::radio::{RadioController, RadioDriver, RadioMode};

/// Payload length: one big-endian `u32` counter
pub const PAYLOAD_LEN: usize = 4;

/// Builds and sends the node's own uplink payloads
#[derive(Debug, Clone)]
pub struct UplinkScheduler {
    period: Duration,
    counter: u32,
}

impl Default for UplinkScheduler {
    fn default() -> Self {
        UplinkScheduler {
            period: Duration::from_secs(DEFAULT_UPLINK_PERIOD_SECS),
            counter: 0,
        }
    }
}

impl UplinkScheduler {
    pub fn new(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::config("uplink period must be positive"));
        }
        Ok(UplinkScheduler { period, counter: 0 })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of firings so far
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Advances the counter and returns the payload carrying it
    pub fn next_payload(&mut self) -> [u8; PAYLOAD_LEN] {
        self.counter = self.counter.wrapping_add(1);
        self.counter.to_be_bytes()
    }

    /// Counts a firing that could not attempt a send, such as a period with
    /// no session available
    pub fn skip(&mut self) -> u32 {
        self.next_payload();
        self.counter
    }

    /// Performs one firing: counts it, then makes a single send attempt.
    ///
    /// The radio must already be in joined-network mode. The counter moves
    /// on whether or not the send succeeds, and a failed send is not retried.
    pub fn fire<D: RadioDriver>(&mut self, radio: &mut RadioController<D>) -> Result<u32> {
        let payload = self.next_payload();
        let counter = self.counter;

        match radio.mode() {
            Some(RadioMode::JoinedNetwork { .. }) => {}
            _ => {
                warn!(counter, "Node packet skipped, radio not in joined mode");
                return Err(Error::invalid_state("radio is not in joined-network mode"));
            }
        }

        match radio.send(&payload) {
            Ok(()) => {
                info!(counter, payload = ?payload, "Sent node packet");
                Ok(counter)
            }
            Err(e) => {
                warn!(counter, error = %e, "Node packet failed");
                Err(e)
            }
        }
    }
}
