//! Handle minting for sensors, readings and tickets, abstracted behind a
//! trait so tests can assert on specific handles instead of random UUIDs.

use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    /// A fresh UUID v4, hyphenated lowercase.
    fn uuid_v4(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct RandomIdGenerator;

impl RandomIdGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl IdGenerator for RandomIdGenerator {
    fn uuid_v4(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Returns ids from a fixed sequence, wrapping around when exhausted.
/// Useful for assigning predictable sensor/reading/ticket refs in tests.
#[derive(Debug, Clone)]
pub struct FixedIdGenerator {
    ids: Vec<String>,
    index: Arc<Mutex<usize>>,
}

impl FixedIdGenerator {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            index: Arc::new(Mutex::new(0)),
        }
    }

    pub fn single(id: impl Into<String>) -> Self {
        Self::new(vec![id.into()])
    }

    pub fn from_strings(ids: &[&str]) -> Self {
        Self::new(ids.iter().map(|s| s.to_string()).collect())
    }
}

impl IdGenerator for FixedIdGenerator {
    fn uuid_v4(&self) -> String {
        let mut index = self.index.lock().unwrap();
        let id = self.ids[*index % self.ids.len()].clone();
        *index += 1;
        id
    }
}
