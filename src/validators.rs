//! Payload-shape validation. These are cheap, local checks the Ingestor
//! runs before a reading ever reaches the Store; they are distinct from
//! the Scorer's physical-plausibility axis, which judges values that are
//! numeric but out of range (§4.C's `InvalidReading` vs `ImpossibleValue`
//! split).

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation error for field '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Opaque identifiers (`externalId`, `zone`, `type`) are restricted to
/// non-empty, safe-ASCII strings with a generous length cap, the same
/// shape the teacher enforces on `batch_id`/`friendly_name`.
pub fn validate_opaque_id(field: &str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("length {} exceeds maximum of {}", value.len(), max_len),
        ));
    }
    if !value.chars().all(|c| c.is_ascii() && (' '..='~').contains(&c)) {
        return Err(ValidationError::new(
            field,
            "must contain only printable ASCII characters",
        ));
    }
    Ok(())
}

pub fn validate_external_id(value: &str) -> Result<(), ValidationError> {
    validate_opaque_id("external_id", value, 256)
}

pub fn validate_zone(value: &str) -> Result<(), ValidationError> {
    validate_opaque_id("zone", value, 128)
}

pub fn validate_sensor_type(value: &str) -> Result<(), ValidationError> {
    validate_opaque_id("type", value, 64)
}

/// Latitude/longitude, when present, must fall on the globe.
pub fn validate_coordinates(lat: Option<f64>, lon: Option<f64>) -> Result<(), ValidationError> {
    if let Some(lat) = lat {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::new("latitude", "must be in [-90, 90]"));
        }
    }
    if let Some(lon) = lon {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::new("longitude", "must be in [-180, 180]"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_external_id_accepts_opaque_strings() {
        assert!(validate_external_id("sensor-001").is_ok());
        assert!(validate_external_id("AA:BB:CC:DD:EE:FF").is_ok());
    }

    #[test]
    fn validate_external_id_rejects_empty() {
        assert!(validate_external_id("").is_err());
    }

    #[test]
    fn validate_external_id_rejects_too_long() {
        assert!(validate_external_id(&"a".repeat(257)).is_err());
        assert!(validate_external_id(&"a".repeat(256)).is_ok());
    }

    #[test]
    fn validate_external_id_rejects_control_characters() {
        assert!(validate_external_id("sensor\n001").is_err());
        assert!(validate_external_id("sensor\t001").is_err());
    }

    #[test]
    fn validate_coordinates_accepts_in_range() {
        assert!(validate_coordinates(Some(45.0), Some(-122.0)).is_ok());
        assert!(validate_coordinates(None, None).is_ok());
    }

    #[test]
    fn validate_coordinates_rejects_out_of_range() {
        assert!(validate_coordinates(Some(91.0), None).is_err());
        assert!(validate_coordinates(None, Some(181.0)).is_err());
    }
}
