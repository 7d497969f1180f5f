//! In-process radio for tests and demos.
//!
//! [`SimulatedRadio`] is handed to the controller; the matching
//! [`SimRadioHandle`] stays with the test to inject received packets, make
//! sends fail, and inspect what the node transmitted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::core::{Error, Result};
use crate::session::Session;
use super::{RadioDriver, RadioMode, RadioProfile, ReceiveCallback};

/// A transmitted packet and the settings it went out with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub mode: RadioMode,
    pub iq_invert: bool,
    pub payload: Bytes,
}

#[derive(Default)]
struct SimState {
    profile: Option<RadioProfile>,
    configurations: Vec<RadioProfile>,
    sent: Vec<SentPacket>,
    handler: Option<ReceiveCallback>,
    asleep: bool,
    failing_sends: u32,
    sessions: Vec<Session>,
}

/// Radio driver that records everything and never touches hardware
#[derive(Default)]
pub struct SimulatedRadio {
    state: Arc<Mutex<SimState>>,
}

/// Test-side view of a [`SimulatedRadio`]
#[derive(Clone)]
pub struct SimRadioHandle {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> SimRadioHandle {
        SimRadioHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl RadioDriver for SimulatedRadio {
    fn configure(&mut self, profile: &RadioProfile) -> Result<()> {
        let mut state = lock(&self.state);
        state.profile = Some(*profile);
        state.configurations.push(*profile);
        state.asleep = false;
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        let profile = match (state.asleep, state.profile) {
            (false, Some(profile)) => profile,
            _ => return Err(Error::radio("radio is not active")),
        };
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(Error::transmit("radio busy"));
        }
        state.sent.push(SentPacket {
            mode: profile.mode,
            iq_invert: profile.iq_invert,
            payload: Bytes::copy_from_slice(payload),
        });
        Ok(())
    }

    fn set_receive_handler(&mut self, handler: Option<ReceiveCallback>) {
        lock(&self.state).handler = handler;
    }

    fn sleep(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.asleep = true;
        state.profile = None;
        Ok(())
    }

    fn load_session(&mut self, session: &Session) -> Result<()> {
        lock(&self.state).sessions.push(session.clone());
        Ok(())
    }
}

impl SimRadioHandle {
    /// Delivers a packet as if it had been received over the air.
    ///
    /// Returns false when nothing is listening.
    pub fn inject(&self, payload: impl Into<Bytes>) -> bool {
        let handler = {
            let state = lock(&self.state);
            if state.asleep {
                return false;
            }
            state.handler.clone()
        };
        match handler {
            Some(handler) => {
                handler(payload.into());
                true
            }
            None => false,
        }
    }

    /// Makes the next `count` sends fail as if the radio were busy
    pub fn fail_next_sends(&self, count: u32) {
        lock(&self.state).failing_sends = count;
    }

    pub fn sent(&self) -> Vec<SentPacket> {
        lock(&self.state).sent.clone()
    }

    /// Payloads sent while in `mode`
    pub fn sent_in(&self, mode: RadioMode) -> Vec<Bytes> {
        lock(&self.state)
            .sent
            .iter()
            .filter(|p| p.mode == mode)
            .map(|p| p.payload.clone())
            .collect()
    }

    pub fn configurations(&self) -> Vec<RadioProfile> {
        lock(&self.state).configurations.clone()
    }

    pub fn current_profile(&self) -> Option<RadioProfile> {
        lock(&self.state).profile
    }

    pub fn loaded_sessions(&self) -> Vec<Session> {
        lock(&self.state).sessions.clone()
    }

    pub fn is_asleep(&self) -> bool {
        lock(&self.state).asleep
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.state).handler.is_some()
    }
}
