//! Core error types (§7) and the stable error codes a transport adapter
//! would map onto client/server status codes, without this crate depending
//! on any transport framework.

use thiserror::Error;

/// Error kinds surfaced by the core, per spec §7.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("sensor not found: {0}")]
    UnknownSensor(String),

    #[error("sensor already registered: {0}")]
    DuplicateId(String),

    #[error("invalid reading: {0}")]
    InvalidReading(String),

    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("scorer error: {0}")]
    ScorerError(String),
}

/// Persistence failure, possibly transient. The core neither retries nor
/// swallows it; the adapter decides.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sensor not found: {0}")]
    NotFound(String),

    #[error("duplicate external id: {0}")]
    Duplicate(String),

    #[error("backing store failure: {0}")]
    Backend(String),
}

impl CoreError {
    /// Stable machine-readable code for this error, for adapters to map to
    /// HTTP status / CLI exit code without this crate knowing about either.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::UnknownSensor(_) => error_codes::UNKNOWN_SENSOR,
            CoreError::DuplicateId(_) => error_codes::DUPLICATE_ID,
            CoreError::InvalidReading(_) => error_codes::INVALID_READING,
            CoreError::StoreError(_) => error_codes::STORE_ERROR,
            CoreError::ScorerError(_) => error_codes::SCORER_ERROR,
        }
    }

    /// Whether an adapter should treat this as a client-caused error (4xx-ish)
    /// as opposed to a server-caused one (5xx-ish).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownSensor(_) | CoreError::DuplicateId(_) | CoreError::InvalidReading(_)
        )
    }
}

/// Stable error code constants, in the teacher's `error_codes` module style.
pub mod error_codes {
    pub const UNKNOWN_SENSOR: &str = "UNKNOWN_SENSOR";
    pub const DUPLICATE_ID: &str = "DUPLICATE_ID";
    pub const INVALID_READING: &str = "INVALID_READING";
    pub const STORE_ERROR: &str = "STORE_ERROR";
    pub const SCORER_ERROR: &str = "SCORER_ERROR";
}
