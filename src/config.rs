//! Engine configuration: thresholds, weights and windows, loaded once at
//! startup and held as an immutable reference. The Scorer never mutates it.

use crate::domain::Parameter;
use std::collections::HashMap;

/// Per-probe (normal, moderate) band thresholds, used by both the temporal
/// and cross-zone axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub normal: f64,
    pub moderate: f64,
}

/// Hard physical bounds for one probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min: f64,
    pub max: f64,
}

/// The fixed weights combining the three axes into a per-parameter trust.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub temporal: f64,
    pub cross: f64,
    pub physical: f64,
}

/// Penalty magnitudes subtracted from the physical-plausibility axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalPenalties {
    pub high_moisture_no_rain: f64,
    pub soil_air_temp_gap: f64,
    pub ph_jump: f64,
    pub ec_spike: f64,
}

/// Strictly descending score bands mapping trust -> (status, label).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustBands {
    pub highly_reliable: f64,
    pub reliable: f64,
    pub uncertain: f64,
    pub unreliable: f64,
}

/// History window sizes used throughout the Scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Windows {
    pub history_window: usize,
    pub drift_window: usize,
    pub trend_window: usize,
}

/// The single immutable configuration object the whole engine is built on.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub weights: Weights,
    pub physical_limits: HashMap<Parameter, Limits>,
    pub temporal_thresholds: HashMap<Parameter, Band>,
    pub static_thresholds: HashMap<Parameter, f64>,
    pub drift_thresholds: HashMap<Parameter, f64>,
    pub cross_thresholds: HashMap<Parameter, Band>,
    pub physical_penalties: PhysicalPenalties,
    pub trust_bands: TrustBands,
    pub windows: Windows,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("weights must sum to 1.0, got {0}")]
    WeightsDoNotSumToOne(f64),
    #[error("trust bands must be strictly descending")]
    TrustBandsNotDescending,
    #[error("invalid override for {field}: {message}")]
    InvalidOverride { field: String, message: String },
}

impl Default for EngineConfig {
    fn default() -> Self {
        use Parameter::*;

        let mut physical_limits = HashMap::new();
        physical_limits.insert(Moisture, Limits { min: 0.0, max: 100.0 });
        physical_limits.insert(Temperature, Limits { min: 0.0, max: 60.0 });
        physical_limits.insert(Ec, Limits { min: 0.0, max: 10.0 });
        physical_limits.insert(Ph, Limits { min: 3.0, max: 10.0 });

        let mut temporal_thresholds = HashMap::new();
        temporal_thresholds.insert(Moisture, Band { normal: 25.0, moderate: 60.0 });
        temporal_thresholds.insert(Temperature, Band { normal: 15.0, moderate: 40.0 });
        temporal_thresholds.insert(Ec, Band { normal: 20.0, moderate: 50.0 });
        temporal_thresholds.insert(Ph, Band { normal: 10.0, moderate: 30.0 });

        let mut static_thresholds = HashMap::new();
        static_thresholds.insert(Moisture, 0.5);
        static_thresholds.insert(Temperature, 0.2);
        static_thresholds.insert(Ec, 0.05);
        static_thresholds.insert(Ph, 0.05);

        let mut drift_thresholds = HashMap::new();
        drift_thresholds.insert(Moisture, 2.0);
        drift_thresholds.insert(Temperature, 1.0);
        drift_thresholds.insert(Ec, 0.2);
        drift_thresholds.insert(Ph, 0.1);

        let mut cross_thresholds = HashMap::new();
        cross_thresholds.insert(Moisture, Band { normal: 25.0, moderate: 50.0 });
        cross_thresholds.insert(Temperature, Band { normal: 20.0, moderate: 45.0 });
        cross_thresholds.insert(Ec, Band { normal: 25.0, moderate: 55.0 });
        cross_thresholds.insert(Ph, Band { normal: 15.0, moderate: 35.0 });

        EngineConfig {
            weights: Weights { temporal: 0.3, cross: 0.5, physical: 0.2 },
            physical_limits,
            temporal_thresholds,
            static_thresholds,
            drift_thresholds,
            cross_thresholds,
            physical_penalties: PhysicalPenalties {
                high_moisture_no_rain: 0.4,
                soil_air_temp_gap: 0.3,
                ph_jump: 0.3,
                ec_spike: 0.3,
            },
            trust_bands: TrustBands {
                highly_reliable: 0.85,
                reliable: 0.78,
                uncertain: 0.73,
                unreliable: 0.50,
            },
            windows: Windows {
                history_window: 10,
                drift_window: 20,
                trend_window: 10,
            },
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.weights.temporal + self.weights.cross + self.weights.physical;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::WeightsDoNotSumToOne(sum));
        }

        let b = &self.trust_bands;
        if !(b.highly_reliable > b.reliable
            && b.reliable > b.uncertain
            && b.uncertain > b.unreliable)
        {
            return Err(ConfigError::TrustBandsNotDescending);
        }

        Ok(())
    }

    /// Apply environment-variable overrides on top of [`EngineConfig::default`],
    /// e.g. `TRUST_WEIGHT_TEMPORAL=0.25`. Unset variables leave the default in
    /// place. Mirrors the teacher's `Config::from_env` pattern of failing
    /// loudly on malformed (not merely absent) values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();

        if let Ok(v) = std::env::var("TRUST_WEIGHT_TEMPORAL") {
            config.weights.temporal = parse_override("TRUST_WEIGHT_TEMPORAL", &v)?;
        }
        if let Ok(v) = std::env::var("TRUST_WEIGHT_CROSS") {
            config.weights.cross = parse_override("TRUST_WEIGHT_CROSS", &v)?;
        }
        if let Ok(v) = std::env::var("TRUST_WEIGHT_PHYSICAL") {
            config.weights.physical = parse_override("TRUST_WEIGHT_PHYSICAL", &v)?;
        }
        if let Ok(v) = std::env::var("TRUST_HISTORY_WINDOW") {
            config.windows.history_window = parse_override("TRUST_HISTORY_WINDOW", &v)?;
        }
        if let Ok(v) = std::env::var("TRUST_DRIFT_WINDOW") {
            config.windows.drift_window = parse_override("TRUST_DRIFT_WINDOW", &v)?;
        }
        if let Ok(v) = std::env::var("TRUST_TREND_WINDOW") {
            config.windows.trend_window = parse_override("TRUST_TREND_WINDOW", &v)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_override<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::InvalidOverride {
        field: field.to_string(),
        message: format!("could not parse '{}'", raw),
    })
}
