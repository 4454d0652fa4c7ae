//! Error types for tablecache operations

use thiserror::Error;

/// Invalid arguments passed by the caller.
///
/// These are always raised before any store call is made and are never
/// retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidArgumentError {
    #[error("The key '{key}' cannot contain any of the reserved characters: '{reserved}'")]
    ReservedCharacters { key: String, reserved: String },

    #[error("Cache keys must contain at least one character")]
    EmptyKey,

    #[error("Expiration must not be negative, got {seconds} seconds")]
    NegativeTtl { seconds: i64 },

    #[error("Expiration timestamp {timestamp} is out of range")]
    TimestampOutOfRange { timestamp: i64 },
}

/// Failures reported by (or about) the remote table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Provisioned throughput exceeded on table {table}")]
    Throttled { table: String },

    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Malformed record for key {key}: {reason}")]
    MalformedRecord { key: String, reason: String },
}

/// Value codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("{codec} failed to decode payload: {reason}")]
    Decode { codec: String, reason: String },

    #[error("{codec} failed to encode value: {reason}")]
    Encode { codec: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("No registered converter supports the item with key '{key}'")]
    NoConverter { key: String },
}

/// Master error type for all tablecache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgumentError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CacheError {
    /// Returns true for caller mistakes that no retry can fix.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns true for failures surfaced by the remote table.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Result type alias for tablecache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
