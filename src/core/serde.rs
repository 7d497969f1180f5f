use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Serializes Duration as seconds
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs_f64().serialize(serializer)
}

/// Deserializes Duration from seconds
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
}

/// Serializes SystemTime as seconds since UNIX_EPOCH
pub fn serialize_time<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let duration = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    duration.as_secs_f64().serialize(serializer)
}

/// Deserializes SystemTime from seconds since UNIX_EPOCH
pub fn deserialize_time<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    let duration = Duration::try_from_secs_f64(secs).map_err(D::Error::custom)?;
    Ok(UNIX_EPOCH + duration)
}

/// Serializes fixed-size key material as an upper-case hex string
pub fn serialize_hex<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: AsRef<[u8]>,
{
    crate::util::to_hex(bytes.as_ref()).serialize(serializer)
}

/// Deserializes `N` bytes of key material from a hex string
pub fn deserialize_hex<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let bytes = crate::util::from_hex(&text).map_err(D::Error::custom)?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| D::Error::custom(format!("expected {} bytes, got {}", N, bytes.len())))
}

/// Serializes a 32-bit device address as 8 hex digits
pub fn serialize_dev_addr<S>(addr: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    format!("{:08X}", addr).serialize(serializer)
}

/// Deserializes a 32-bit device address from hex
pub fn deserialize_dev_addr<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    u32::from_str_radix(text.trim(), 16)
        .map_err(|e| D::Error::custom(format!("invalid device address {:?}: {}", text, e)))
}
