//! Utility module
//!
//! Hex helpers, frequency formatting and log setup used throughout the
//! library.

use tracing_subscriber::{fmt, EnvFilter};

use crate::core::{Error, Result};

/// Encodes bytes as upper-case hex
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Decodes a hex string; either case is accepted
pub fn from_hex(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::config(format!("odd-length hex string {:?}", text)));
    }
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            Some(pair)
                .filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| Error::config(format!("invalid hex digits in {:?}", text)))
        })
        .collect()
}

/// Formats a frequency in Hz as MHz without trailing zeros (`903.9`)
pub fn format_frequency_mhz(hz: u32) -> String {
    let whole = hz / 1_000_000;
    let frac = hz % 1_000_000;
    if frac == 0 {
        return format!("{}.0", whole);
    }
    let digits = format!("{:06}", frac);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Installs the global log subscriber.
///
/// `filter` uses `EnvFilter` syntax; `RUST_LOG` wins when set. Calling this
/// twice is harmless, the second call is ignored.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_timer(fmt::time::uptime())
        .with_target(false)
        .try_init();
}
