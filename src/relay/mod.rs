//! Hop relay decision
//!
//! Every frame travelling up the tree carries a one-byte marker in front of
//! its payload. A frame straight from an end node starts with the origin
//! marker (64). The first relay to hear it prepends a hop marker; every relay
//! after that rewrites the marker in place. The marker's high nibble tells a
//! relay whether the frame was just handed up from the level directly below
//! it, which is the only case in which it re-transmits.

use bytes::{BufMut, BytesMut};

use crate::core::{Error, Frame, Result, TreeLevel, ORIGIN_MARKER};

/// Step applied to a hop marker per level climbed
const HOP_STEP: u8 = 16;

/// One-byte hop marker: `(origin - 1) * 16 + current`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HopMarker(u8);

impl HopMarker {
    /// Marker stamped by the first relay to touch a fresh frame
    pub fn first_hop(level: TreeLevel) -> Self {
        let level = level.level();
        HopMarker((level - 1) * HOP_STEP + level)
    }

    pub fn from_byte(byte: u8) -> Self {
        HopMarker(byte)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Level the frame was handed up from
    pub fn origin_level(&self) -> u8 {
        self.0 / HOP_STEP
    }

    /// Marker after climbing one more level.
    ///
    /// `None` when the marker is already in the bottom nibble row and cannot
    /// describe another hop.
    pub fn climbed(&self) -> Option<Self> {
        self.0.checked_sub(HOP_STEP).map(HopMarker)
    }
}

/// Outcome of inspecting a received frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayDecision {
    /// Re-transmit this (re-marked) frame upward
    Forward(Frame),
    /// Not ours to relay
    Drop { marker: HopMarker },
}

impl RelayDecision {
    pub fn is_forward(&self) -> bool {
        matches!(self, RelayDecision::Forward(_))
    }
}

/// Decides whether a relay at `local` re-transmits `frame`.
///
/// Fresh frames get a hop marker prepended, leaving the original bytes
/// (origin marker included) intact. Relayed frames have their marker
/// replaced. The frame is forwarded only when the marker's origin level is
/// exactly one below `local`.
pub fn decide(frame: &Frame, local: TreeLevel) -> Result<RelayDecision> {
    let bytes = frame.as_bytes();
    let lead = *bytes
        .first()
        .ok_or_else(|| Error::malformed("empty frame"))?;

    let mut out = BytesMut::with_capacity(bytes.len() + 1);
    let marker = if lead == ORIGIN_MARKER {
        let marker = HopMarker::first_hop(local);
        out.put_u8(marker.value());
        out.extend_from_slice(bytes);
        marker
    } else {
        let marker = HopMarker::from_byte(lead).climbed().ok_or_else(|| {
            Error::malformed(format!("hop marker {} has no level left to climb", lead))
        })?;
        out.put_u8(marker.value());
        out.extend_from_slice(&bytes[1..]);
        marker
    };

    if marker.origin_level() + 1 == local.level() {
        Ok(RelayDecision::Forward(Frame::new(out.freeze())))
    } else {
        Ok(RelayDecision::Drop { marker })
    }
}

/// Relay bound to this node's tree level
#[derive(Debug, Clone, Copy)]
pub struct HopRelay {
    level: TreeLevel,
}

impl HopRelay {
    pub fn new(level: TreeLevel) -> Self {
        HopRelay { level }
    }

    pub fn level(&self) -> TreeLevel {
        self.level
    }

    pub fn decide(&self, frame: &Frame) -> Result<RelayDecision> {
        decide(frame, self.level)
    }
}
