use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{Error, Result, MAX_TREE_LEVEL, ORIGIN_MARKER};

/// A node's fixed position in the relay tree.
///
/// Level 1 sits directly below the collector; deeper nodes have larger
/// levels, up to [`MAX_TREE_LEVEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TreeLevel(u8);

impl TreeLevel {
    /// Creates a tree level, rejecting values outside `1..=15`
    pub fn new(level: u8) -> Result<Self> {
        if (1..=MAX_TREE_LEVEL).contains(&level) {
            Ok(TreeLevel(level))
        } else {
            Err(Error::config(format!(
                "tree level {} outside 1..={}",
                level, MAX_TREE_LEVEL
            )))
        }
    }

    /// The top of the tree, one hop from the collector
    pub fn top() -> Self {
        TreeLevel(1)
    }

    /// Returns the level number
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Whether upward hops from here leave the relay tree
    pub fn is_top(&self) -> bool {
        self.0 == 1
    }

    /// The level one hop closer to the collector, if it is still a relay level
    pub fn parent(&self) -> Option<Self> {
        if self.0 > 1 {
            Some(TreeLevel(self.0 - 1))
        } else {
            None
        }
    }
}

impl TryFrom<u8> for TreeLevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        TreeLevel::new(level)
    }
}

impl From<TreeLevel> for u8 {
    fn from(level: TreeLevel) -> u8 {
        level.0
    }
}

impl fmt::Display for TreeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// What the device does with its radio.
///
/// Configured as `1`, `2` or `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeviceRole {
    /// Relay frames only
    Forwarder = 1,
    /// Originate uplinks only
    Node = 2,
    /// Relay frames and originate uplinks, time-sharing the radio
    Both = 3,
}

impl DeviceRole {
    /// Parses the numeric role code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(DeviceRole::Forwarder),
            2 => Ok(DeviceRole::Node),
            3 => Ok(DeviceRole::Both),
            _ => Err(Error::config(format!("unknown device role {}", code))),
        }
    }

    /// Numeric role code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Whether this role listens for and relays raw frames
    pub fn relays(&self) -> bool {
        matches!(self, DeviceRole::Forwarder | DeviceRole::Both)
    }

    /// Whether this role sends its own uplinks
    pub fn originates(&self) -> bool {
        matches!(self, DeviceRole::Node | DeviceRole::Both)
    }
}

impl TryFrom<u8> for DeviceRole {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        DeviceRole::from_code(code)
    }
}

impl From<DeviceRole> for u8 {
    fn from(role: DeviceRole) -> u8 {
        role.code()
    }
}

/// Gateway-style identifier derived from the radio's MAC address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewayId(pub String);

impl GatewayId {
    /// First three MAC bytes, `FFFE`, then the last three MAC bytes
    pub fn from_mac(mac: [u8; 6]) -> Self {
        let hex = |bytes: &[u8]| {
            bytes
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<String>()
        };
        GatewayId(format!("{}FFFE{}", hex(&mac[..3]), hex(&mac[3..])))
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable identity of this relay node, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Device identifier
    pub id: GatewayId,
    /// Position in the tree
    pub level: TreeLevel,
    /// Deepest level the tree is expected to have
    pub max_depth: TreeLevel,
    /// Configured role
    pub role: DeviceRole,
}

/// One radio packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    /// Wraps raw packet bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Frame(bytes.into())
    }

    /// Returns the packet bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the frame
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Leading byte: origin marker or hop marker
    pub fn lead(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// Whether no relay has touched this frame yet
    pub fn is_fresh(&self) -> bool {
        self.lead() == Some(ORIGIN_MARKER)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Frame(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Frame {
    fn from(bytes: &'static [u8]) -> Self {
        Frame(Bytes::from_static(bytes))
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
