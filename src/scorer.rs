//! The Scorer (§4.B): a pure function from a reading and its context to a
//! [`TrustResult`]. No suspension points, no hidden state — identical
//! inputs always produce identical (four-decimal-rounded) output.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::domain::{
    AxisScores, HealthTrend, Parameter, ParamTrust, Reading, RootCause, RootCauseSet, SensorRef,
    Severity, Status, TrustResult,
};

/// Everything the Scorer needs beyond the current reading. Built by the
/// Ingestor from Store reads before the scoring call.
pub struct ScoringContext<'a> {
    pub sensor_ref: SensorRef,
    pub current: &'a Reading,
    /// This sensor's prior readings, newest-first, up to the drift window (20).
    pub history: &'a [Reading],
    /// Peers' single latest reading in the same zone.
    pub peer_latest: &'a [(SensorRef, Reading)],
    /// Peers' own recent history, same zone, for field-event classification.
    pub peer_history: &'a HashMap<SensorRef, Vec<Reading>>,
    /// This sensor's last 10 TrustResults, newest-first.
    pub recent_trust: &'a [TrustResult],
    /// Peers' latest TrustResult score, same zone, for `zoneReliability`.
    pub peer_latest_scores: &'a [f64],
}

/// Rounds to four fractional digits, per §9's numeric-precision rule.
fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Centred-index linear-regression slope of `values` (oldest-first).
/// Returns 0.0 in the degenerate case (fewer than 2 points, or zero
/// variance in the index), which callers treat as stable/no-drift.
fn regression_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean_index = (n as f64 - 1.0) / 2.0;
    let mean_value = values.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, v) in values.iter().enumerate() {
        let ci = i as f64 - mean_index;
        num += ci * (v - mean_value);
        den += ci * ci;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

struct TemporalOutcome {
    score: f64,
    cause: RootCause,
}

struct CrossOutcome {
    score: f64,
    cause: RootCause,
}

/// §4.B.1: temporal axis. `history` is this sensor's prior values for `p`,
/// newest-first, already filtered to the ones that carried `p`.
fn temporal_axis(config: &EngineConfig, p: Parameter, v: f64, history_newest_first: &[f64]) -> TemporalOutcome {
    if history_newest_first.len() < 2 {
        return TemporalOutcome { score: 1.0, cause: RootCause::Normal };
    }

    // Static and changePct look only at the sensor's own last `history_window`
    // readings; drift below uses the wider `history_newest_first` window the
    // caller supplied (up to `drift_window`) to see slower trends.
    let recent = &history_newest_first[..history_newest_first.len().min(config.windows.history_window)];

    let max = recent.iter().cloned().fold(f64::MIN, f64::max);
    let min = recent.iter().cloned().fold(f64::MAX, f64::min);
    let range = max - min;
    let static_thr = config.static_thresholds[&p];
    if range < static_thr {
        return TemporalOutcome { score: 0.2, cause: RootCause::Static };
    }

    if history_newest_first.len() >= 5 {
        let drift_thr = config.drift_thresholds[&p];
        // Oldest-first for the regression, so the slope's sign means "rising over time".
        let oldest_first: Vec<f64> = history_newest_first.iter().rev().cloned().collect();
        let slope = regression_slope(&oldest_first);
        if slope.abs() > drift_thr {
            return TemporalOutcome { score: 0.4, cause: RootCause::Drift };
        }
    }

    let mean = recent.iter().sum::<f64>() / recent.len() as f64;
    if mean == 0.0 {
        return TemporalOutcome { score: 1.0, cause: RootCause::Normal };
    }
    let change_pct = (v - mean).abs() / mean.abs() * 100.0;
    let band = config.temporal_thresholds[&p];
    if change_pct <= band.normal {
        TemporalOutcome { score: 1.0, cause: RootCause::Normal }
    } else if change_pct <= band.moderate {
        TemporalOutcome { score: 0.6, cause: RootCause::Spike }
    } else {
        TemporalOutcome { score: 0.1, cause: RootCause::Spike }
    }
}

/// §4.B.2: cross-zone axis.
fn cross_axis(
    config: &EngineConfig,
    p: Parameter,
    v: f64,
    peer_latest_values: &[f64],
    peer_change_pcts: &[f64],
) -> CrossOutcome {
    if peer_latest_values.is_empty() {
        return CrossOutcome { score: 1.0, cause: RootCause::Normal };
    }

    let mean_z = peer_latest_values.iter().sum::<f64>() / peer_latest_values.len() as f64;
    if mean_z == 0.0 {
        return CrossOutcome { score: 1.0, cause: RootCause::Normal };
    }

    let dev_pct = (v - mean_z).abs() / mean_z.abs() * 100.0;
    let band = config.cross_thresholds[&p];
    if dev_pct <= band.normal {
        return CrossOutcome { score: 1.0, cause: RootCause::Normal };
    }

    let extreme = dev_pct > band.moderate;
    if !extreme {
        return CrossOutcome { score: 0.6, cause: RootCause::Normal };
    }

    let peer_mean_change = if peer_change_pcts.is_empty() {
        0.0
    } else {
        peer_change_pcts.iter().sum::<f64>() / peer_change_pcts.len() as f64
    };

    if peer_mean_change > band.normal {
        CrossOutcome { score: 0.5, cause: RootCause::FieldEvent }
    } else {
        CrossOutcome { score: 0.1, cause: RootCause::ZoneMismatch }
    }
}

struct PhysicalOutcome {
    score: f64,
    causes: Vec<RootCause>,
    flags: Vec<String>,
}

/// §4.B.3: physical plausibility, computed once per reading and shared
/// across all four parameters.
fn physical_axis(config: &EngineConfig, current: &Reading, prev: Option<&Reading>) -> PhysicalOutcome {
    for p in Parameter::ALL {
        if let Some(v) = current.value(p) {
            let limits = config.physical_limits[&p];
            if v < limits.min || v > limits.max {
                return PhysicalOutcome {
                    score: 0.1,
                    causes: vec![RootCause::ImpossibleValue],
                    flags: vec![format!("{} value {} is outside physical bounds", p.as_str(), v)],
                };
            }
        }
    }

    let mut score = 1.0f64;
    let mut causes = Vec::new();
    let mut flags = Vec::new();
    let penalties = &config.physical_penalties;

    if let Some(moisture) = current.values.moisture {
        let raining = current.context.is_raining.unwrap_or(false);
        let irrigating = current.context.irrigation_active.unwrap_or(false);
        if moisture > 85.0 && !raining && !irrigating {
            score -= penalties.high_moisture_no_rain;
            causes.push(RootCause::WeatherMismatch);
            flags.push("high moisture with no rain or irrigation active".to_string());
        }
    }

    if let (Some(soil_temp), Some(air_temp)) = (current.values.temperature, current.context.air_temp) {
        if (soil_temp - air_temp).abs() > 10.0 {
            score -= penalties.soil_air_temp_gap;
            causes.push(RootCause::WeatherMismatch);
            flags.push("soil temperature diverges from air temperature by more than 10C".to_string());
        }
    }

    if let (Some(ph), Some(prev_ph)) = (current.values.ph, prev.and_then(|r| r.values.ph)) {
        if (ph - prev_ph).abs() > 1.5 {
            score -= penalties.ph_jump;
            causes.push(RootCause::Spike);
            flags.push("pH jumped more than 1.5 since the previous reading".to_string());
        }
    }

    if let (Some(ec), Some(prev_ec)) = (current.values.ec, prev.and_then(|r| r.values.ec)) {
        if prev_ec != 0.0 && (ec - prev_ec).abs() / prev_ec.abs() * 100.0 > 25.0 {
            score -= penalties.ec_spike;
            causes.push(RootCause::Spike);
            flags.push("EC changed more than 25% since the previous reading".to_string());
        }
    }

    PhysicalOutcome { score: score.max(0.1), causes, flags }
}

fn band_status(config: &EngineConfig, score: f64) -> (Status, &'static str) {
    let b = &config.trust_bands;
    if score >= b.highly_reliable {
        (Status::Healthy, "Highly Reliable")
    } else if score >= b.reliable {
        (Status::Healthy, "Reliable")
    } else if score >= b.uncertain {
        (Status::Warning, "Uncertain")
    } else if score >= b.unreliable {
        (Status::Anomalous, "Unreliable")
    } else {
        (Status::Anomalous, "Anomaly")
    }
}

fn resolve_severity(root_causes: &RootCauseSet, score: f64) -> Severity {
    if root_causes.contains(RootCause::ImpossibleValue) {
        return Severity::Critical;
    }
    if score < 0.15 {
        return Severity::Critical;
    }
    if root_causes.contains(RootCause::ZoneMismatch) && score < 0.5 {
        return Severity::High;
    }
    if root_causes.contains(RootCause::Spike) && score < 0.5 {
        return Severity::High;
    }
    if root_causes.contains(RootCause::Static) {
        return Severity::High;
    }
    if root_causes.contains(RootCause::Drift) {
        return Severity::Medium;
    }
    if root_causes.contains(RootCause::WeatherMismatch) {
        return Severity::Medium;
    }
    if score < 0.65 {
        return Severity::Low;
    }
    Severity::None
}

fn alert_tag(severity: Severity) -> Option<String> {
    match severity {
        Severity::Critical => Some("Immediate attention required".to_string()),
        Severity::High => Some("Urgent maintenance required".to_string()),
        Severity::Medium => Some("Monitor sensor".to_string()),
        _ => None,
    }
}

fn health_trend(recent_trust: &[TrustResult]) -> (HealthTrend, f64, f64) {
    if recent_trust.len() < 3 {
        return (HealthTrend::Unknown, 0.0, 0.0);
    }
    // recent_trust is newest-first; the regression wants oldest-first so the
    // slope's sign reads as "change over time".
    let oldest_first: Vec<f64> = recent_trust.iter().rev().map(|t| t.score).collect();
    let slope = regression_slope(&oldest_first);
    let trend = if slope > 0.01 {
        HealthTrend::Improving
    } else if slope < -0.01 {
        HealthTrend::Degrading
    } else {
        HealthTrend::Stable
    };
    let anomaly_rate =
        recent_trust.iter().filter(|t| t.status == Status::Anomalous).count() as f64 / recent_trust.len() as f64;
    (trend, slope, anomaly_rate)
}

fn failure_prediction(trend: HealthTrend, slope: f64, anomaly_rate: f64) -> Option<String> {
    if slope < -0.03 {
        Some("Rapid degradation detected; failure likely without intervention".to_string())
    } else if trend == HealthTrend::Degrading && anomaly_rate > 0.3 {
        Some("Sustained anomalous readings suggest impending sensor failure".to_string())
    } else {
        None
    }
}

fn confidence_level(score: f64) -> f64 {
    if score > 0.85 {
        0.9
    } else if score > 0.70 {
        0.6
    } else {
        0.3
    }
}

/// Runs the full three-axis scoring pipeline and returns a rounded
/// [`TrustResult`], or `None` when the sensor has fewer than 5 prior
/// readings overall (§4.B "Insufficient history").
pub fn score(config: &EngineConfig, ctx: &ScoringContext<'_>, now: String) -> Option<TrustResult> {
    if ctx.history.len() < 5 {
        return None;
    }

    let prev_reading = ctx.history.first();
    let physical = physical_axis(config, ctx.current, prev_reading);

    let mut per_parameter = Vec::new();
    let mut root_causes = Vec::new();
    let mut flags = physical.flags.clone();
    root_causes.extend(physical.causes.iter().copied());

    for p in Parameter::ALL {
        let Some(v) = ctx.current.value(p) else { continue };

        let own_history: Vec<f64> = ctx.history.iter().filter_map(|r| r.value(p)).collect();
        let temporal = temporal_axis(config, p, v, &own_history);

        let peer_latest_values: Vec<f64> =
            ctx.peer_latest.iter().filter_map(|(_, r)| r.value(p)).collect();
        let peer_change_pcts: Vec<f64> = ctx
            .peer_history
            .values()
            .filter_map(|history| {
                let values: Vec<f64> = history.iter().filter_map(|r| r.value(p)).collect();
                if values.len() < 2 {
                    return None;
                }
                let latest = values[0];
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                if mean == 0.0 {
                    return None;
                }
                Some((latest - mean).abs() / mean.abs() * 100.0)
            })
            .collect();
        let cross = cross_axis(config, p, v, &peer_latest_values, &peer_change_pcts);

        let trust = config.weights.temporal * temporal.score
            + config.weights.cross * cross.score
            + config.weights.physical * physical.score;

        if temporal.cause != RootCause::Normal {
            root_causes.push(temporal.cause);
            flags.push(format!("{}: temporal axis flagged {:?}", p.as_str(), temporal.cause));
        }
        if cross.cause != RootCause::Normal {
            root_causes.push(cross.cause);
            flags.push(format!("{}: cross-zone axis flagged {:?}", p.as_str(), cross.cause));
        }

        per_parameter.push((
            p,
            ParamTrust {
                axes: AxisScores {
                    temporal: round4(temporal.score),
                    temporal_cause: temporal.cause,
                    cross: round4(cross.score),
                    cross_cause: cross.cause,
                    physical: round4(physical.score),
                },
                trust: round4(trust),
            },
        ));
    }

    let root_causes = RootCauseSet::from_causes(root_causes);

    let sensor_trust = if per_parameter.is_empty() {
        0.0
    } else {
        per_parameter.iter().map(|(_, t)| t.trust).sum::<f64>() / per_parameter.len() as f64
    };
    let sensor_trust = round4(sensor_trust);

    let (status, label) = band_status(config, sensor_trust);
    let severity = resolve_severity(&root_causes, sensor_trust);
    let (trend, slope, anomaly_rate) = health_trend(ctx.recent_trust);

    let irrigation_safe = sensor_trust >= 0.75
        && !root_causes.contains(RootCause::ImpossibleValue)
        && !root_causes.contains(RootCause::ZoneMismatch);

    let zone_reliability = if ctx.peer_latest_scores.is_empty() {
        None
    } else {
        Some(round4(
            ctx.peer_latest_scores.iter().sum::<f64>() / ctx.peer_latest_scores.len() as f64,
        ))
    };

    let sustainability_insight = if ctx.current.context.irrigation_active.unwrap_or(false) && !irrigation_safe {
        Some("Irrigation is active while conditions are unsafe; review before continuing".to_string())
    } else {
        None
    };

    Some(TrustResult {
        sensor_ref: ctx.sensor_ref.clone(),
        reading_ref: ctx.current.reading_ref.clone(),
        score: sensor_trust,
        status,
        label,
        severity,
        per_parameter,
        root_causes,
        health_trend: trend,
        trend_slope: round4(slope),
        anomaly_rate: round4(anomaly_rate),
        irrigation_safe,
        failure_prediction: failure_prediction(trend, slope, anomaly_rate),
        confidence_level: confidence_level(sensor_trust),
        zone_reliability,
        sustainability_insight,
        alert_tag: alert_tag(severity),
        flags,
        evaluated_at: now,
    })
}
