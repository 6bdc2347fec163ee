//! `soil_trust_engine` — a sensor trust verification engine for a fleet of
//! agricultural soil sensors.
//!
//! The crate's job stops at the diagnostic pipeline: ingest a reading, score
//! it, classify it, persist the verdict, and fan it out to subscribers,
//! opening a maintenance ticket when a real fault (not a field event) is
//! detected. It does not speak HTTP, does not model users or organisations,
//! and does not forecast anything beyond the `irrigationSafe` flag.

pub mod aggregation;
pub mod broadcaster;
pub mod config;
pub mod cursor;
pub mod domain;
pub mod engine;
pub mod error;
pub mod id_generator;
pub mod ingestor;
pub mod scorer;
pub mod store;
pub mod ticket_manager;
pub mod time;
pub mod validators;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::CoreError;
