use std::fmt;
use std::time::{Duration, Instant};

use crate::core::DeviceRole;

/// Which half of a dual-role node currently holds the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioHolder {
    /// Raw transceiver, relaying frames
    Relay,
    /// Joined-network session, sending the node's own packet
    Uplink,
}

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ForwarderActive,
    NodeActive,
    BothActive(RadioHolder),
}

impl Phase {
    /// Active phase for a device role
    pub fn active(role: DeviceRole) -> Self {
        match role {
            DeviceRole::Forwarder => Phase::ForwarderActive,
            DeviceRole::Node => Phase::NodeActive,
            DeviceRole::Both => Phase::BothActive(RadioHolder::Relay),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::ForwarderActive => "ForwarderActive",
            Phase::NodeActive => "NodeActive",
            Phase::BothActive(RadioHolder::Relay) => "BothActive(Relay)",
            Phase::BothActive(RadioHolder::Uplink) => "BothActive(Uplink)",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Frames taken off the queue
    pub frames_received: u64,
    pub frames_forwarded: u64,
    /// Frames not addressed to this level
    pub frames_dropped: u64,
    pub frames_malformed: u64,
    /// Frames received under an older radio configuration
    pub frames_stale: u64,
    /// Forward decisions whose upward send failed
    pub forward_failures: u64,
    pub uplinks_sent: u64,
    pub uplinks_failed: u64,
    /// Ticks with no session to send under
    pub uplinks_skipped: u64,
    /// Events thrown away at shutdown
    pub events_discarded: u64,
}

/// Everything the dispatcher mutates, owned in one place
#[derive(Debug)]
pub struct CoordinatorState {
    pub phase: Phase,
    pub stats: Stats,
    entered: Instant,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        CoordinatorState {
            phase: Phase::Idle,
            stats: Stats::default(),
            entered: Instant::now(),
        }
    }
}

/// Snapshot of the coordinator for status reporting
#[derive(Debug, Clone)]
pub struct StateInfo {
    pub state_type: &'static str,
    /// Which mode holds the radio, dual-role nodes only
    pub holder: Option<RadioHolder>,
    pub stats: Stats,
    pub time_in_state: Duration,
}

impl CoordinatorState {
    /// Moves to `phase`, restarting the time-in-state clock on a real change
    pub fn enter(&mut self, phase: Phase) {
        let changed = match (self.phase, phase) {
            (Phase::BothActive(_), Phase::BothActive(_)) => false,
            (a, b) => a != b,
        };
        if changed {
            self.entered = Instant::now();
        }
        self.phase = phase;
    }

    pub fn info(&self) -> StateInfo {
        let holder = match self.phase {
            Phase::BothActive(holder) => Some(holder),
            _ => None,
        };
        StateInfo {
            state_type: self.phase.name(),
            holder,
            stats: self.stats,
            time_in_state: self.entered.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_per_role() {
        assert_eq!(Phase::active(DeviceRole::Forwarder), Phase::ForwarderActive);
        assert_eq!(Phase::active(DeviceRole::Node), Phase::NodeActive);
        assert_eq!(
            Phase::active(DeviceRole::Both),
            Phase::BothActive(RadioHolder::Relay)
        );
        assert!(Phase::Idle.is_idle());
    }

    #[test]
    fn test_info_reports_holder() {
        let mut state = CoordinatorState::default();
        assert_eq!(state.info().state_type, "Idle");
        assert!(state.info().holder.is_none());

        state.enter(Phase::BothActive(RadioHolder::Uplink));
        state.stats.uplinks_sent += 1;
        let info = state.info();
        assert_eq!(info.state_type, "BothActive(Uplink)");
        assert_eq!(info.holder, Some(RadioHolder::Uplink));
        assert_eq!(info.stats.uplinks_sent, 1);
    }
}
