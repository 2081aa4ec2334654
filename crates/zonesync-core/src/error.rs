//! Error types for zonesync
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zonesync
#[derive(Error, Debug)]
pub enum Error {
    /// A record name is not inside any configured zone
    #[error("No zone matches record {record:?} (known zones: {})", zones.join(", "))]
    NoMatchingZone {
        /// The record's owner name
        record: String,
        /// Known zone names, longest first
        zones: Vec<String>,
    },

    /// An address from the IPAM source could not be parsed
    #[error("Malformed address {address:?}: {reason}")]
    MalformedAddress {
        /// The literal supplied by the source
        address: String,
        /// Parser message
        reason: String,
    },

    /// Loading or persisting a zone failed
    #[error("Zone storage error ({zone}): {message}")]
    ZoneStorage {
        /// Zone name
        zone: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IPAM source errors
    #[error("IPAM source error: {0}")]
    Ipam(String),

    /// HTTP client errors (from the IPAM API)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "no matching zone" error
    pub fn no_matching_zone(record: impl Into<String>, zones: Vec<String>) -> Self {
        Self::NoMatchingZone {
            record: record.into(),
            zones,
        }
    }

    /// Create a malformed address error
    pub fn malformed_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a zone storage error
    pub fn zone_storage(zone: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ZoneStorage {
            zone: zone.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an IPAM source error
    pub fn ipam(msg: impl Into<String>) -> Self {
        Self::Ipam(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error aborts a whole sync run.
    ///
    /// Per-record and per-zone errors are collected instead.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Ipam(_) | Self::Authentication(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
