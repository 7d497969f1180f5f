use std::io;
use thiserror::Error;

/// Error types for the relay node
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Transmit failure: {0}")]
    TransmitFailure(String),

    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Join error: {0}")]
    Join(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Radio error: {0}")]
    Radio(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new malformed frame error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedFrame(msg.into())
    }

    /// Creates a new transmit failure
    pub fn transmit(msg: impl Into<String>) -> Self {
        Error::TransmitFailure(msg.into())
    }

    /// Creates a new session unavailable error
    pub fn session_unavailable(msg: impl Into<String>) -> Self {
        Error::SessionUnavailable(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new join error
    pub fn join(msg: impl Into<String>) -> Self {
        Error::Join(msg.into())
    }

    /// Creates a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Creates a new radio error
    pub fn radio(msg: impl Into<String>) -> Self {
        Error::Radio(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Whether this error must stop the node from starting.
    ///
    /// Only configuration errors are fatal; everything else is scoped to a
    /// single received frame or a single uplink period.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::malformed("empty frame");
        assert!(matches!(err, Error::MalformedFrame(_)));
        assert_eq!(err.to_string(), "Malformed frame: empty frame");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(Error::config("bad level").is_fatal());
        assert!(!Error::transmit("busy").is_fatal());
        assert!(!Error::session_unavailable("none saved").is_fatal());
        assert!(!Error::malformed("empty").is_fatal());
    }
}
