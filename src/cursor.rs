//! Opaque pagination cursors for `ListSensors` / `ListTickets`, adapted
//! from the teacher's base64-encoded JSON cursor module.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListCursor {
    pub last_ref: String,
    pub last_sort_key: String,
}

#[derive(Debug, Clone)]
pub struct CursorError {
    pub message: String,
}

impl CursorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for CursorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cursor error: {}", self.message)
    }
}

impl std::error::Error for CursorError {}

pub fn encode_cursor(last_ref: &str, last_sort_key: &str) -> Result<String, CursorError> {
    let cursor = ListCursor {
        last_ref: last_ref.to_string(),
        last_sort_key: last_sort_key.to_string(),
    };
    let json = serde_json::to_string(&cursor)
        .map_err(|e| CursorError::new(format!("failed to serialize cursor: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(json.as_bytes()))
}

pub fn decode_cursor(cursor: &str) -> Result<ListCursor, CursorError> {
    let bytes = general_purpose::STANDARD
        .decode(cursor)
        .map_err(|e| CursorError::new(format!("failed to decode base64: {}", e)))?;
    let json = String::from_utf8(bytes)
        .map_err(|e| CursorError::new(format!("failed to decode utf8: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| CursorError::new(format!("failed to deserialize cursor: {}", e)))
}
