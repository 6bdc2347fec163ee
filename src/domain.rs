//! Core domain types: sensors, readings, trust verdicts and tickets.
//!
//! These are plain data carried by value between Store, Scorer, Ingestor,
//! TicketManager and Broadcaster. None of them know how they are persisted
//! or transmitted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque handle to a registered sensor, minted by the Store on registration.
pub type SensorRef = String;

/// Opaque handle to a single appended reading.
pub type ReadingRef = String;

/// Opaque handle to a maintenance ticket.
pub type TicketRef = String;

/// A registered soil sensor. Immutable once created except `zone`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sensor {
    pub sensor_ref: SensorRef,
    pub external_id: String,
    pub zone: String,
    pub sensor_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub installed_at: String,
}

/// The four probes a reading may carry. Each is independently optional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ReadingValues {
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub ec: Option<f64>,
    pub ph: Option<f64>,
}

/// Context attached to a reading, each field independently optional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ReadingContext {
    pub air_temp: Option<f64>,
    pub is_raining: Option<bool>,
    pub irrigation_active: Option<bool>,
}

/// One probe of {moisture, temperature, ec, ph}.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Moisture,
    Temperature,
    Ec,
    Ph,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::Moisture,
        Parameter::Temperature,
        Parameter::Ec,
        Parameter::Ph,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Moisture => "moisture",
            Parameter::Temperature => "temperature",
            Parameter::Ec => "ec",
            Parameter::Ph => "ph",
        }
    }
}

/// An append-only sensor reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub reading_ref: ReadingRef,
    pub sensor_ref: SensorRef,
    pub timestamp: i64,
    pub values: ReadingValues,
    pub context: ReadingContext,
}

impl Reading {
    pub fn value(&self, p: Parameter) -> Option<f64> {
        match p {
            Parameter::Moisture => self.values.moisture,
            Parameter::Temperature => self.values.temperature,
            Parameter::Ec => self.values.ec,
            Parameter::Ph => self.values.ph,
        }
    }
}

/// Closed set of root-cause tags the Scorer may attach to a verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    Normal,
    Spike,
    Static,
    Drift,
    ZoneMismatch,
    WeatherMismatch,
    FieldEvent,
    ImpossibleValue,
}

/// Ordered set of root causes with `Normal` enforced as sole-occupant-or-absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RootCauseSet(Vec<RootCause>);

impl RootCauseSet {
    pub fn normal() -> Self {
        RootCauseSet(vec![RootCause::Normal])
    }

    /// Build from an unordered bag, deduplicating and applying the
    /// Normal-iff-empty-otherwise invariant.
    pub fn from_causes(mut causes: Vec<RootCause>) -> Self {
        causes.retain(|c| *c != RootCause::Normal);
        let mut seen = HashSet::new();
        causes.retain(|c| seen.insert(*c));
        if causes.is_empty() {
            RootCauseSet::normal()
        } else {
            RootCauseSet(causes)
        }
    }

    pub fn contains(&self, cause: RootCause) -> bool {
        self.0.contains(&cause)
    }

    pub fn is_normal_only(&self) -> bool {
        self.0.len() == 1 && self.0[0] == RootCause::Normal
    }

    pub fn as_slice(&self) -> &[RootCause] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &RootCause> {
        self.0.iter()
    }

    pub fn merge(&mut self, other: &RootCauseSet) {
        for c in other.iter() {
            if *c != RootCause::Normal && !self.0.contains(c) {
                self.0.push(*c);
            }
        }
        if self.0.len() > 1 {
            self.0.retain(|c| *c != RootCause::Normal);
        }
    }
}

/// Overall sensor status band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Healthy,
    Warning,
    Anomalous,
}

/// Operational urgency, ordered None < Low < Medium < High < Critical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Health trend classification over recent TrustResults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthTrend {
    Improving,
    Degrading,
    Stable,
    Unknown,
}

/// Per-axis sub-scores and the root cause each axis resolved to, for one probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxisScores {
    pub temporal: f64,
    pub temporal_cause: RootCause,
    pub cross: f64,
    pub cross_cause: RootCause,
    pub physical: f64,
}

/// Verdict for a single parameter of one reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamTrust {
    pub axes: AxisScores,
    pub trust: f64,
}

/// The full verdict for one (sensor, reading) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustResult {
    pub sensor_ref: SensorRef,
    pub reading_ref: ReadingRef,
    pub score: f64,
    pub status: Status,
    pub label: &'static str,
    pub severity: Severity,
    pub per_parameter: Vec<(Parameter, ParamTrust)>,
    pub root_causes: RootCauseSet,
    pub health_trend: HealthTrend,
    pub trend_slope: f64,
    pub anomaly_rate: f64,
    pub irrigation_safe: bool,
    pub failure_prediction: Option<String>,
    pub confidence_level: f64,
    pub zone_reliability: Option<f64>,
    pub sustainability_insight: Option<String>,
    pub alert_tag: Option<String>,
    pub flags: Vec<String>,
    pub evaluated_at: String,
}

impl TrustResult {
    pub fn param_trust(&self, p: Parameter) -> Option<&ParamTrust> {
        self.per_parameter.iter().find(|(pp, _)| *pp == p).map(|(_, t)| t)
    }

    /// The initial verdict a newly registered sensor is seeded with.
    pub fn initial(sensor_ref: SensorRef, evaluated_at: String) -> Self {
        TrustResult {
            sensor_ref,
            reading_ref: String::new(),
            score: 1.0,
            status: Status::Healthy,
            label: "Highly Reliable",
            severity: Severity::None,
            per_parameter: Vec::new(),
            root_causes: RootCauseSet::normal(),
            health_trend: HealthTrend::Unknown,
            trend_slope: 0.0,
            anomaly_rate: 0.0,
            irrigation_safe: true,
            failure_prediction: None,
            confidence_level: 0.9,
            zone_reliability: None,
            sustainability_insight: None,
            alert_tag: None,
            flags: Vec::new(),
            evaluated_at,
        }
    }
}

/// Ticket lifecycle state. Open -> InProgress -> Resolved; Open -> Resolved
/// directly is also permitted. No transitions out of Resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

/// A maintenance ticket. At most one Open ticket per sensor (enforced by
/// TicketManager, not by this type).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub ticket_ref: TicketRef,
    pub sensor_ref: SensorRef,
    pub issue: String,
    pub severity: Severity,
    pub status: TicketStatus,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

/// A single ingest-time error kept in a capped per-sensor ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub timestamp: String,
    pub code: &'static str,
    pub message: String,
}
