//! Read-side aggregation views (§6): `DashboardSummary` and
//! `ZoneStatistics`. These read directly from the Store — they never go
//! through the Ingestor, and never suspend on a per-sensor lock.
//!
//! The per-sensor health category is not in spec.md; it is carried over
//! from the teacher's `DeviceStatus::health_category` (§E of SPEC_FULL.md)
//! as an additional, non-mandated field on `ZoneStatistics`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Severity, Status};
use crate::store::Store;

/// Fleet-wide counts by status and by severity, for `DashboardSummary`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DashboardSummary {
    pub total_sensors: usize,
    pub healthy: usize,
    pub warning: usize,
    pub anomalous: usize,
    pub severity_none: usize,
    pub severity_low: usize,
    pub severity_medium: usize,
    pub severity_high: usize,
    pub severity_critical: usize,
}

/// Per-zone status counts, for `ZoneStatistics`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneStatEntry {
    pub zone: String,
    pub healthy: usize,
    pub warning: usize,
    pub anomalous: usize,
    pub total: usize,
}

/// Teacher's `DeviceStatus::health_category` bands, generalized from
/// hardware ids to sensor refs: healthy within 2h of its last reading,
/// stale within 6h, missing beyond that; failing overrides both when an
/// ingest-time error was recorded in the last 24h.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthCategory {
    Healthy,
    Stale,
    Missing,
    Failing,
}

const HEALTHY_WINDOW_MS: i64 = 2 * 3_600_000;
const STALE_WINDOW_MS: i64 = 6 * 3_600_000;
const FAILING_ERROR_WINDOW_MS: i64 = 24 * 3_600_000;

pub fn health_category(
    last_reading_at_ms: Option<i64>,
    last_error_at_ms: Option<i64>,
    now_ms: i64,
) -> HealthCategory {
    if let Some(error_at) = last_error_at_ms {
        if now_ms - error_at < FAILING_ERROR_WINDOW_MS {
            return HealthCategory::Failing;
        }
    }

    match last_reading_at_ms {
        None => HealthCategory::Missing,
        Some(seen_at) => {
            let age = now_ms - seen_at;
            if age <= HEALTHY_WINDOW_MS {
                HealthCategory::Healthy
            } else if age <= STALE_WINDOW_MS {
                HealthCategory::Stale
            } else {
                HealthCategory::Missing
            }
        }
    }
}

/// Builds the fleet-wide `DashboardSummary` (§6) from the Store's latest
/// trust result per sensor.
pub async fn dashboard_summary(store: &dyn Store) -> DashboardSummary {
    let sensors = store.list_sensors().await;
    let latest = store.latest_trust_per_sensor().await;

    let mut summary = DashboardSummary { total_sensors: sensors.len(), ..Default::default() };
    for sensor in &sensors {
        let Some(trust) = latest.get(&sensor.sensor_ref) else { continue };
        match trust.status {
            Status::Healthy => summary.healthy += 1,
            Status::Warning => summary.warning += 1,
            Status::Anomalous => summary.anomalous += 1,
        }
        match trust.severity {
            Severity::None => summary.severity_none += 1,
            Severity::Low => summary.severity_low += 1,
            Severity::Medium => summary.severity_medium += 1,
            Severity::High => summary.severity_high += 1,
            Severity::Critical => summary.severity_critical += 1,
        }
    }
    summary
}

/// Builds per-zone status counts (§6) from the Store's latest trust result
/// per sensor, grouped by the sensor's current zone.
pub async fn zone_statistics(store: &dyn Store) -> Vec<ZoneStatEntry> {
    let sensors = store.list_sensors().await;
    let latest = store.latest_trust_per_sensor().await;

    let mut by_zone: HashMap<String, ZoneStatEntry> = HashMap::new();
    for sensor in &sensors {
        let entry = by_zone.entry(sensor.zone.clone()).or_insert_with(|| ZoneStatEntry {
            zone: sensor.zone.clone(),
            healthy: 0,
            warning: 0,
            anomalous: 0,
            total: 0,
        });
        entry.total += 1;
        if let Some(trust) = latest.get(&sensor.sensor_ref) {
            match trust.status {
                Status::Healthy => entry.healthy += 1,
                Status::Warning => entry.warning += 1,
                Status::Anomalous => entry.anomalous += 1,
            }
        }
    }

    let mut stats: Vec<ZoneStatEntry> = by_zone.into_values().collect();
    stats.sort_by(|a, b| a.zone.cmp(&b.zone));
    stats
}
