use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::{Error, Frame, Result};
use crate::session::Session;
use super::{RadioDriver, RadioMode, RadioProfile, ReceiveCallback};

/// A packet handed up by the driver, tagged with the configuration it was
/// received under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub frame: Frame,
    /// Configuration epoch at reception time
    pub epoch: u64,
}

/// Owner of the single physical radio.
///
/// Every `configure`, `sleep` and handler change starts a new epoch. Frames
/// carry the epoch they arrived in, so frames received before a
/// reconfiguration can be recognised and discarded later.
pub struct RadioController<D: RadioDriver> {
    driver: D,
    profile: Option<RadioProfile>,
    epoch: Arc<AtomicU64>,
    handler_registered: bool,
}

impl<D: RadioDriver> RadioController<D> {
    pub fn new(driver: D) -> Self {
        RadioController {
            driver,
            profile: None,
            epoch: Arc::new(AtomicU64::new(0)),
            handler_registered: false,
        }
    }

    /// Applies a new profile; in-flight receive state is invalidated
    pub fn configure(&mut self, profile: &RadioProfile) -> Result<()> {
        self.bump_epoch();
        self.profile = None;
        self.driver.configure(profile)?;
        self.profile = Some(*profile);
        debug!(%profile, mode = ?profile.mode, epoch = self.epoch(), "Radio configured");
        Ok(())
    }

    /// Transmits one packet under the current profile
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.profile.is_none() {
            return Err(Error::transmit("radio is not configured"));
        }
        self.driver.send(payload).map_err(|e| match e {
            Error::TransmitFailure(_) => e,
            other => Error::transmit(other.to_string()),
        })
    }

    /// Routes received packets to `handler`, tagged with the current epoch
    pub fn register_receive_handler<F>(&mut self, handler: F)
    where
        F: Fn(ReceivedFrame) + Send + Sync + 'static,
    {
        let epoch = Arc::clone(&self.epoch);
        let callback: ReceiveCallback = Arc::new(move |bytes| {
            handler(ReceivedFrame {
                frame: Frame::new(bytes),
                epoch: epoch.load(Ordering::SeqCst),
            })
        });
        self.driver.set_receive_handler(Some(callback));
        self.handler_registered = true;
    }

    /// Detaches the receive handler; frames already tagged become stale
    pub fn unregister_receive_handler(&mut self) {
        self.driver.set_receive_handler(None);
        self.handler_registered = false;
        self.bump_epoch();
    }

    /// Puts the radio to sleep; it must be configured again before use
    pub fn sleep(&mut self) -> Result<()> {
        self.bump_epoch();
        self.profile = None;
        self.driver.sleep()?;
        info!("Radio asleep");
        Ok(())
    }

    /// Passes session state to the driver's network stack.
    ///
    /// Only meaningful while configured for joined-network operation.
    pub fn load_session(&mut self, session: &Session) -> Result<()> {
        match self.mode() {
            Some(RadioMode::JoinedNetwork { .. }) => self.driver.load_session(session),
            _ => Err(Error::invalid_state(
                "session can only be loaded in joined-network mode",
            )),
        }
    }

    /// Whether a received frame is still valid for relay processing
    pub fn accepts(&self, received: &ReceivedFrame) -> bool {
        self.handler_registered
            && received.epoch == self.epoch()
            && self.mode() == Some(RadioMode::RawRelay)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn profile(&self) -> Option<&RadioProfile> {
        self.profile.as_ref()
    }

    pub fn mode(&self) -> Option<RadioMode> {
        self.profile.map(|p| p.mode)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}
