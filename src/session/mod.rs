//! Joined-network session state
//!
//! A [`Session`] carries everything the radio needs to transmit as an
//! authenticated node without running the join handshake again. Sessions are
//! produced by a [`Joiner`] and owned by a [`SessionStore`]; the coordinator
//! only borrows them for the length of one uplink.

mod join;
mod store;

pub use self::join::{AbpJoiner, Joiner};
pub use self::store::{FileSessionStore, MemorySessionStore, SessionStore};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Network activation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Activation by personalization: fixed address and session keys
    Abp,
    /// Over-the-air activation: keys negotiated with the network
    Otaa,
}

/// Join credentials, opaque to everything but the joiner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Credentials {
    Abp {
        #[serde(serialize_with = "crate::core::serde::serialize_dev_addr")]
        #[serde(deserialize_with = "crate::core::serde::deserialize_dev_addr")]
        dev_addr: u32,
        #[serde(serialize_with = "crate::core::serde::serialize_hex")]
        #[serde(deserialize_with = "crate::core::serde::deserialize_hex")]
        nwk_skey: [u8; 16],
        #[serde(serialize_with = "crate::core::serde::serialize_hex")]
        #[serde(deserialize_with = "crate::core::serde::deserialize_hex")]
        app_skey: [u8; 16],
    },
    Otaa {
        #[serde(serialize_with = "crate::core::serde::serialize_hex")]
        #[serde(deserialize_with = "crate::core::serde::deserialize_hex")]
        dev_eui: [u8; 8],
        #[serde(serialize_with = "crate::core::serde::serialize_hex")]
        #[serde(deserialize_with = "crate::core::serde::deserialize_hex")]
        app_eui: [u8; 8],
        #[serde(serialize_with = "crate::core::serde::serialize_hex")]
        #[serde(deserialize_with = "crate::core::serde::deserialize_hex")]
        app_key: [u8; 16],
    },
}

impl Credentials {
    /// The activation method these credentials are for
    pub fn mode(&self) -> JoinMode {
        match self {
            Credentials::Abp { .. } => JoinMode::Abp,
            Credentials::Otaa { .. } => JoinMode::Otaa,
        }
    }
}

/// One uplink channel of the joined-network channel plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub index: u8,
    /// Frequency in Hz
    pub frequency: u32,
    pub dr_min: u8,
    pub dr_max: u8,
}

/// Channel plan with every channel pinned to one frequency.
///
/// Single-channel collectors only listen on one frequency, so the node's
/// regional channel hopping is collapsed onto it.
pub fn single_frequency_plan(frequency: u32, channels: u8, dr_min: u8, dr_max: u8) -> Vec<ChannelSpec> {
    (0..channels)
        .map(|index| ChannelSpec {
            index,
            frequency,
            dr_min,
            dr_max,
        })
        .collect()
}

/// Everything needed to resume joined-network operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Network-assigned device address
    pub dev_addr: u32,
    /// Network session key
    pub nwk_skey: [u8; 16],
    /// Application session key
    pub app_skey: [u8; 16],
    /// Negotiated channel plan
    pub channels: Vec<ChannelSpec>,
    /// Regional data-rate index for uplinks
    pub data_rate_index: u8,
    /// Uplink frame counter
    pub uplink_counter: u32,
}

impl Session {
    /// Encodes the session into its persisted form
    pub fn to_blob(&self) -> Result<Bytes> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(|e| Error::storage(format!("Failed to serialize session: {}", e)))
    }

    /// Decodes a persisted session
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        bincode::deserialize(blob)
            .map_err(|e| Error::storage(format!("Failed to deserialize session: {}", e)))
    }

    /// Records one transmitted uplink
    pub fn record_uplink(&mut self) {
        self.uplink_counter = self.uplink_counter.wrapping_add(1);
    }
}
