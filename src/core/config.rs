//! Node configuration
//!
//! The configuration surface is small: the device role, the tree level, the
//! radio frequency and a data-rate string. Everything else has a regional
//! default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    DeviceRole, Error, GatewayId, NodeIdentity, Result, TreeLevel, DEFAULT_UPLINK_PERIOD_SECS,
    MAX_TREE_LEVEL,
};
use crate::radio::{Bandwidth, DataRate, RadioProfile, SpreadingFactor};
use crate::session::{single_frequency_plan, ChannelSpec, Credentials};

/// Regional radio defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Us915,
    Eu868,
}

impl Region {
    /// Default relay frequency in Hz
    pub fn default_frequency(&self) -> u32 {
        match self {
            Region::Us915 => 903_900_000,
            Region::Eu868 => 868_100_000,
        }
    }

    /// Default relay data rate
    pub fn default_data_rate(&self) -> &'static str {
        "SF7BW125"
    }

    /// Default data-rate index for joined-network uplinks
    pub fn default_node_data_rate(&self) -> u8 {
        match self {
            Region::Us915 => 3,
            Region::Eu868 => 5,
        }
    }

    /// Number of uplink channels in the regional plan
    pub fn channel_count(&self) -> u8 {
        match self {
            Region::Us915 => 72,
            Region::Eu868 => 16,
        }
    }

    /// Highest data-rate index usable on the single-frequency plan
    pub fn max_plan_data_rate(&self) -> u8 {
        match self {
            Region::Us915 => 3,
            Region::Eu868 => 5,
        }
    }

    /// Modulation for a regional uplink data-rate index
    pub fn data_rate(&self, index: u8) -> Result<DataRate> {
        use Bandwidth::*;
        use SpreadingFactor::*;

        let (sf, bw) = match (self, index) {
            (Region::Us915, 0) => (SF10, Bw125kHz),
            (Region::Us915, 1) => (SF9, Bw125kHz),
            (Region::Us915, 2) => (SF8, Bw125kHz),
            (Region::Us915, 3) => (SF7, Bw125kHz),
            (Region::Us915, 4) => (SF8, Bw500kHz),
            (Region::Eu868, 0) => (SF12, Bw125kHz),
            (Region::Eu868, 1) => (SF11, Bw125kHz),
            (Region::Eu868, 2) => (SF10, Bw125kHz),
            (Region::Eu868, 3) => (SF9, Bw125kHz),
            (Region::Eu868, 4) => (SF8, Bw125kHz),
            (Region::Eu868, 5) => (SF7, Bw125kHz),
            (Region::Eu868, 6) => (SF7, Bw250kHz),
            _ => {
                return Err(Error::config(format!(
                    "data rate index {} not defined for {:?}",
                    index, self
                )))
            }
        };
        Ok(DataRate::new(sf, bw))
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::Us915
    }
}

/// Configuration for a relay node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Explicit node identifier; derived from `mac_address` when absent
    pub gateway_id: Option<String>,
    /// Radio MAC address, `AA:BB:CC:DD:EE:FF`
    pub mac_address: Option<String>,
    /// 1 = forwarder, 2 = node, 3 = both
    pub role: u8,
    /// Position in the tree, 1..=15
    pub tree_level: u8,
    /// Deepest level of the deployed tree
    pub max_depth: u8,
    pub region: Region,
    /// Relay frequency in Hz; regional default when absent
    pub frequency: Option<u32>,
    /// Relay data rate, `SF<n>BW<khz>`; regional default when absent
    pub data_rate: Option<String>,
    /// Data-rate index for joined-network uplinks; regional default when absent
    pub node_data_rate: Option<u8>,
    /// Time between uplinks
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub uplink_period: Duration,
    /// Session file; sessions are kept in memory when absent
    pub session_path: Option<PathBuf>,
    /// Log filter directive
    pub log_filter: String,
    /// Join credentials; required when the node originates uplinks
    pub join: Option<Credentials>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            gateway_id: None,
            mac_address: None,
            role: DeviceRole::Forwarder.code(),
            tree_level: 2,
            max_depth: MAX_TREE_LEVEL,
            region: Region::default(),
            frequency: None,
            data_rate: None,
            node_data_rate: None,
            uplink_period: Duration::from_secs(DEFAULT_UPLINK_PERIOD_SECS),
            session_path: None,
            log_filter: "info".to_string(),
            join: None,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from a TOML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Parses configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Renders the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
            .unwrap_or_else(|| self.region.default_frequency())
    }

    pub fn node_data_rate(&self) -> u8 {
        self.node_data_rate
            .unwrap_or_else(|| self.region.default_node_data_rate())
    }

    /// Validates the whole configuration
    pub fn validate(&self) -> Result<()> {
        let identity = self.identity()?;
        self.relay_profile()?;
        self.joined_profile()?;

        if identity.role.originates() {
            if self.join.is_none() {
                return Err(Error::config("role needs join credentials"));
            }
            if self.uplink_period.is_zero() {
                return Err(Error::config("uplink period must be positive"));
            }
        }
        Ok(())
    }

    /// Node identity derived from the configuration
    pub fn identity(&self) -> Result<NodeIdentity> {
        let role = DeviceRole::from_code(self.role)?;
        let level = TreeLevel::new(self.tree_level)?;
        let max_depth = TreeLevel::new(self.max_depth)?;
        if level > max_depth {
            return Err(Error::config(format!(
                "tree level {} deeper than max depth {}",
                level.level(),
                max_depth.level()
            )));
        }

        let id = match (&self.gateway_id, &self.mac_address) {
            (Some(id), _) => GatewayId(id.clone()),
            (None, Some(mac)) => GatewayId::from_mac(parse_mac(mac)?),
            (None, None) => GatewayId::from_mac([0; 6]),
        };

        Ok(NodeIdentity {
            id,
            level,
            max_depth,
            role,
        })
    }

    /// Raw relay profile from the frequency and data-rate string
    pub fn relay_profile(&self) -> Result<RadioProfile> {
        let data_rate: DataRate = self
            .data_rate
            .as_deref()
            .unwrap_or_else(|| self.region.default_data_rate())
            .parse()?;
        Ok(RadioProfile::relay(self.frequency(), data_rate))
    }

    /// Joined-network profile at the node data rate
    pub fn joined_profile(&self) -> Result<RadioProfile> {
        let index = self.node_data_rate();
        let data_rate = self.region.data_rate(index)?;
        Ok(RadioProfile::joined(self.frequency(), index, data_rate))
    }

    /// Channel plan with every channel on the relay frequency
    pub fn channel_plan(&self) -> Vec<ChannelSpec> {
        single_frequency_plan(
            self.frequency(),
            self.region.channel_count(),
            0,
            self.region.max_plan_data_rate(),
        )
    }
}

fn parse_mac(text: &str) -> Result<[u8; 6]> {
    let bytes = crate::util::from_hex(&text.replace([':', '-'], ""))
        .map_err(|_| Error::config(format!("invalid MAC address {:?}", text)))?;
    <[u8; 6]>::try_from(bytes.as_slice())
        .map_err(|_| Error::config(format!("MAC address {:?} is not 6 bytes", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::RadioMode;

    fn node_config() -> RelayConfig {
        RelayConfig {
            role: 3,
            tree_level: 3,
            join: Some(Credentials::Abp {
                dev_addr: 0x2601_160C,
                nwk_skey: [1; 16],
                app_skey: [2; 16],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_valid_forwarder() {
        let config = RelayConfig::default();
        config.validate().unwrap();

        let identity = config.identity().unwrap();
        assert_eq!(identity.role, DeviceRole::Forwarder);
        assert_eq!(identity.level.level(), 2);
        assert_eq!(config.uplink_period, Duration::from_secs(7));
    }

    #[test]
    fn test_relay_profile_from_region() {
        let profile = RelayConfig::default().relay_profile().unwrap();
        assert_eq!(profile.frequency, 903_900_000);
        assert_eq!(profile.data_rate.to_string(), "SF7BW125");
        assert_eq!(profile.mode, RadioMode::RawRelay);
    }

    #[test]
    fn test_joined_profile_uses_node_data_rate() {
        let config = RelayConfig {
            region: Region::Eu868,
            ..node_config()
        };
        let profile = config.joined_profile().unwrap();
        assert_eq!(profile.frequency, 868_100_000);
        assert_eq!(profile.mode, RadioMode::JoinedNetwork { data_rate_index: 5 });
        assert!(!profile.iq_invert);
    }

    #[test]
    fn test_invalid_surface_is_fatal() {
        let bad = [
            RelayConfig { role: 0, ..Default::default() },
            RelayConfig { tree_level: 16, ..Default::default() },
            RelayConfig { tree_level: 0, ..Default::default() },
            RelayConfig { tree_level: 5, max_depth: 4, ..Default::default() },
            RelayConfig { data_rate: Some("SF7BW999".into()), ..Default::default() },
            RelayConfig { node_data_rate: Some(9), ..Default::default() },
            RelayConfig { role: 2, ..Default::default() },
            RelayConfig { uplink_period: Duration::ZERO, ..node_config() },
            RelayConfig { mac_address: Some("zz".into()), ..Default::default() },
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert!(err.is_fatal(), "{:?}", config);
        }
    }

    #[test]
    fn test_gateway_id_from_mac_address() {
        let config = RelayConfig {
            mac_address: Some("24:0a:c4:01:02:03".into()),
            ..Default::default()
        };
        assert_eq!(config.identity().unwrap().id.0, "240AC4FFFE010203");
    }

    #[test]
    fn test_channel_plan() {
        let plan = node_config().channel_plan();
        assert_eq!(plan.len(), 72);
        assert!(plan.iter().all(|ch| ch.frequency == 903_900_000 && ch.dr_max == 3));
    }

    #[test]
    fn test_toml_round_trip() {
        let text = r#"
            role = 3
            tree_level = 4
            region = "US915"
            data_rate = "SF9BW125"
            uplink_period = 10.0

            [join]
            mode = "abp"
            dev_addr = "2601160C"
            nwk_skey = "5864350495E1123A5AD221DF700CCEC8"
            app_skey = "4B751B14B6C2C7BAB00B46EEA30E920D"
        "#;
        let config = RelayConfig::from_toml(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.tree_level, 4);
        assert_eq!(config.uplink_period, Duration::from_secs(10));
        assert_eq!(config.relay_profile().unwrap().data_rate.sf.value(), 9);

        let again = RelayConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(again.join, config.join);
        assert_eq!(again.data_rate, config.data_rate);
    }

    #[test]
    fn test_json_defaults_fill_missing_fields() {
        let config: RelayConfig = serde_json::from_str(r#"{"tree_level": 7}"#).unwrap();
        assert_eq!(config.tree_level, 7);
        assert_eq!(config.role, 1);
        assert_eq!(config.log_filter, "info");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = RelayConfig::load("/nonexistent/relay.toml").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
