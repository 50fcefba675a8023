//! Error kinds for decoding, ingestion and the sink
use thiserror::Error;

/// Failure to turn a located payload (or its hex text) into a reading
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Odd number of hex digits
    #[error("Invalid hex: odd length {0}")]
    OddLength(usize),

    /// Character outside 0-9, A-F, a-f
    #[error("Invalid hex digit {digit:?} at position {position}")]
    InvalidDigit { digit: char, position: usize },

    /// Format version byte outside the supported set
    #[error("Unsupported data format {0}")]
    UnsupportedFormat(u8),

    /// Payload shorter than the layout for its version
    #[error("Payload too short for data format {version}: {len} bytes (min: {min})")]
    TooShort { version: u8, len: usize, min: usize },

    /// Nothing to decode
    #[error("Empty payload")]
    Empty,
}

impl DecodeError {
    /// True when the payload is well-formed bytes but not a layout we decode
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            DecodeError::UnsupportedFormat(_) | DecodeError::TooShort { .. } | DecodeError::Empty
        )
    }
}

/// Failure while turning one inbound message into samples
#[derive(Error, Debug)]
pub enum IngestError {
    /// Input did not have the expected shape
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// Input was not JSON at all
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sample payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Failure while handing a batch to the sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// Unusable database URL or TLS setup
    #[error("Sink configuration error: {0}")]
    Config(String),

    /// Could not reach the store
    #[error("Connection error: {0}")]
    Connect(String),

    /// Store rejected the write
    #[error("Write error: {0}")]
    Write(#[from] tokio_postgres::Error),
}

/// Failure while loading configuration at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
