//! Error types for the aggregator.
//!
//! Per-target producer failures ([`ProducerError`]) are expected and
//! isolated: workers convert them into tagged `error` records, never into a
//! request-level failure. [`StreamError`] covers the request level: invalid
//! input before anything starts, or the shared sink becoming unusable.

use thiserror::Error;

/// Failure at the upstream producer boundary, scoped to one target.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("cannot connect to analysis engine at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("analysis engine returned status {status}")]
    Status { status: u16 },

    #[error("upstream read failed: {0}")]
    Read(String),
}

/// Request-level failure. Per-target faults never surface here.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("targets must be an array of strings")]
    InvalidTargets,

    #[error("outbound sink error: {0}")]
    Sink(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stream already closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, StreamError>;
