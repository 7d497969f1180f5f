//! Radio modulation settings.
//!
//! A [`RadioProfile`] is derived once from configuration: the relay profile
//! from the human-readable data-rate string (`"SF7BW125"`), the joined-network
//! profile from a regional data-rate index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Spreading factor (chips per symbol = 2^SF)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadingFactor {
    SF5 = 5,
    SF6 = 6,
    SF7 = 7,
    SF8 = 8,
    SF9 = 9,
    SF10 = 10,
    SF11 = 11,
    SF12 = 12,
}

impl SpreadingFactor {
    /// Create a spreading factor from a raw value
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            5 => Ok(Self::SF5),
            6 => Ok(Self::SF6),
            7 => Ok(Self::SF7),
            8 => Ok(Self::SF8),
            9 => Ok(Self::SF9),
            10 => Ok(Self::SF10),
            11 => Ok(Self::SF11),
            12 => Ok(Self::SF12),
            _ => Err(Error::config(format!("invalid spreading factor {}", value))),
        }
    }

    /// Get the raw value
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for SpreadingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SF{}", self.value())
    }
}

/// Channel bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bandwidth {
    Bw125kHz = 125,
    Bw250kHz = 250,
    Bw500kHz = 500,
}

impl Bandwidth {
    pub fn from_khz(khz: u32) -> Result<Self> {
        match khz {
            125 => Ok(Self::Bw125kHz),
            250 => Ok(Self::Bw250kHz),
            500 => Ok(Self::Bw500kHz),
            _ => Err(Error::config(format!("invalid bandwidth {} kHz", khz))),
        }
    }

    pub fn khz(&self) -> u32 {
        *self as u32
    }

    pub fn hz(&self) -> u32 {
        self.khz() * 1000
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BW{}", self.khz())
    }
}

/// Forward error correction rate 4/(4+n)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodingRate {
    CR4_5 = 1,
    CR4_6 = 2,
    CR4_7 = 3,
    CR4_8 = 4,
}

impl CodingRate {
    /// Denominator of the 4/x rate
    pub fn denominator(&self) -> u8 {
        4 + *self as u8
    }
}

impl fmt::Display for CodingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "4/{}", self.denominator())
    }
}

/// Spreading factor and bandwidth pair, written `SF<n>BW<khz>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRate {
    pub sf: SpreadingFactor,
    pub bw: Bandwidth,
}

impl DataRate {
    pub fn new(sf: SpreadingFactor, bw: Bandwidth) -> Self {
        DataRate { sf, bw }
    }
}

impl FromStr for DataRate {
    type Err = Error;

    /// Parses strings like `SF7BW125` or `SF12BW500`.
    ///
    /// The spreading factor is the one or two digits after `SF`; the
    /// bandwidth is whatever follows `BW`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::config(format!("invalid data rate {:?}", s));

        let rest = s.trim().strip_prefix("SF").ok_or_else(invalid)?;
        let digits = rest
            .char_indices()
            .take_while(|(_, c)| c.is_ascii_digit())
            .count()
            .min(2);
        if digits == 0 {
            return Err(invalid());
        }
        let sf: u8 = rest[..digits].parse().map_err(|_| invalid())?;

        let khz: u32 = rest[digits..]
            .strip_prefix("BW")
            .ok_or_else(invalid)?
            .parse()
            .map_err(|_| invalid())?;

        Ok(DataRate {
            sf: SpreadingFactor::from_u8(sf)?,
            bw: Bandwidth::from_khz(khz)?,
        })
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sf, self.bw)
    }
}

/// Which kind of traffic the radio is set up for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioMode {
    /// Raw transceiver, no network join
    RawRelay,
    /// Joined-network node transmitting at a regional data-rate index
    JoinedNetwork { data_rate_index: u8 },
}

/// Complete set of radio parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioProfile {
    pub mode: RadioMode,
    /// Centre frequency in Hz
    pub frequency: u32,
    pub data_rate: DataRate,
    pub coding_rate: CodingRate,
    /// Preamble length in symbols
    pub preamble: u16,
    /// Invert I/Q on transmit
    pub iq_invert: bool,
}

impl RadioProfile {
    pub const PREAMBLE: u16 = 8;

    /// Raw relay profile: preamble 8, CR 4/5.
    ///
    /// The relay only transmits to forward frames up the tree, and parents
    /// listen with normal IQ, so transmit inversion stays off.
    pub fn relay(frequency: u32, data_rate: DataRate) -> Self {
        RadioProfile {
            mode: RadioMode::RawRelay,
            frequency,
            data_rate,
            coding_rate: CodingRate::CR4_5,
            preamble: Self::PREAMBLE,
            iq_invert: false,
        }
    }

    /// Joined-network profile for a regional data-rate index
    pub fn joined(frequency: u32, data_rate_index: u8, data_rate: DataRate) -> Self {
        RadioProfile {
            mode: RadioMode::JoinedNetwork { data_rate_index },
            frequency,
            data_rate,
            coding_rate: CodingRate::CR4_5,
            preamble: Self::PREAMBLE,
            iq_invert: false,
        }
    }

    pub fn is_relay(&self) -> bool {
        self.mode == RadioMode::RawRelay
    }
}

impl fmt::Display for RadioProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} MHz {} CR{}",
            crate::util::format_frequency_mhz(self.frequency),
            self.data_rate,
            self.coding_rate
        )
    }
}
