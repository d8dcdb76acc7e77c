//! Error taxonomy for the ingestion pipeline.
//!
//! Every kind here is recovered at the boundary where it occurs: feed errors
//! trigger a reconnect, parse errors drop one frame, persistence errors are
//! logged. Only [`ConfigError`] ever reaches the binary.

use thiserror::Error;

/// Transport or protocol failure on a feed connection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    /// Could not establish the connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Read error on an established connection.
    #[error("stream error: {0}")]
    Stream(String),

    /// Server closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

/// Malformed or incomplete frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a finite number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unknown side: {0}")]
    InvalidSide(String),

    #[error("unknown event type: {0}")]
    UnknownEvent(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Json(err.to_string())
    }
}

/// Durable-write failure on the persistence side channel.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid configuration detected at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no symbols configured and liquidation feed disabled")]
    NoSymbols,

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    #[error("{context} thresholds inverted: notable {notable} > extra_large {extra_large}")]
    InvertedThresholds {
        context: &'static str,
        notable: f64,
        extra_large: f64,
    },

    #[error("{context} thresholds must be finite: notable {notable}, extra_large {extra_large}")]
    NonFiniteThreshold {
        context: &'static str,
        notable: f64,
        extra_large: f64,
    },

    #[error("invalid feed uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },
}
