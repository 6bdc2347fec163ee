//! Property/boundary tests from spec §8 "Boundary behaviour".
//!
//! - A reading with `moisture = 100.0` is accepted (boundary inclusive);
//!   at `100.0001` it is `ImpossibleValue`.
//! - Fewer than 5 prior readings yields a null verdict; exactly 5 yields one.
//! - A ten-reading static window yields cause `Static` with temporal score 0.2.

use std::collections::HashMap;

use proptest::prelude::*;
use soil_trust_engine::config::EngineConfig;
use soil_trust_engine::domain::{Parameter, Reading, ReadingContext, ReadingValues, RootCause};
use soil_trust_engine::scorer::{self, ScoringContext};
use soil_trust_engine::test_utils::generators;

fn reading(moisture: f64, temperature: f64, ec: f64, ph: f64) -> Reading {
    Reading {
        reading_ref: "r".to_string(),
        sensor_ref: "s".to_string(),
        timestamp: 0,
        values: ReadingValues {
            moisture: Some(moisture),
            temperature: Some(temperature),
            ec: Some(ec),
            ph: Some(ph),
        },
        context: ReadingContext::default(),
    }
}

fn history(n: usize, moisture: f64) -> Vec<Reading> {
    (0..n).map(|_| reading(moisture, 22.0, 1.2, 6.5)).collect()
}

#[test]
fn moisture_at_exactly_one_hundred_is_accepted() {
    let config = EngineConfig::default();
    let current = reading(100.0, 22.0, 1.2, 6.5);
    let hist = history(10, 30.0);
    let peer_history: HashMap<String, Vec<Reading>> = HashMap::new();
    let ctx = ScoringContext {
        sensor_ref: "s".to_string(),
        current: &current,
        history: &hist,
        peer_latest: &[],
        peer_history: &peer_history,
        recent_trust: &[],
        peer_latest_scores: &[],
    };
    let result = scorer::score(&config, &ctx, "now".to_string()).unwrap();
    assert!(!result.root_causes.contains(RootCause::ImpossibleValue));
}

#[test]
fn moisture_just_above_one_hundred_is_impossible_value() {
    let config = EngineConfig::default();
    let current = reading(100.0001, 22.0, 1.2, 6.5);
    let hist = history(10, 30.0);
    let peer_history: HashMap<String, Vec<Reading>> = HashMap::new();
    let ctx = ScoringContext {
        sensor_ref: "s".to_string(),
        current: &current,
        history: &hist,
        peer_latest: &[],
        peer_history: &peer_history,
        recent_trust: &[],
        peer_latest_scores: &[],
    };
    let result = scorer::score(&config, &ctx, "now".to_string()).unwrap();
    assert!(result.root_causes.contains(RootCause::ImpossibleValue));
}

#[test]
fn fewer_than_five_priors_is_null_exactly_five_is_not() {
    let config = EngineConfig::default();
    let current = reading(30.5, 22.1, 1.22, 6.5);

    for n in 0..5 {
        let hist = history(n, 30.0);
        let peer_history: HashMap<String, Vec<Reading>> = HashMap::new();
        let ctx = ScoringContext {
            sensor_ref: "s".to_string(),
            current: &current,
            history: &hist,
            peer_latest: &[],
            peer_history: &peer_history,
            recent_trust: &[],
            peer_latest_scores: &[],
        };
        assert!(scorer::score(&config, &ctx, "now".to_string()).is_none(), "n={} should be insufficient", n);
    }

    let hist = history(5, 30.0);
    let peer_history: HashMap<String, Vec<Reading>> = HashMap::new();
    let ctx = ScoringContext {
        sensor_ref: "s".to_string(),
        current: &current,
        history: &hist,
        peer_latest: &[],
        peer_history: &peer_history,
        recent_trust: &[],
        peer_latest_scores: &[],
    };
    assert!(scorer::score(&config, &ctx, "now".to_string()).is_some());
}

#[test]
fn ten_reading_static_window_yields_static_cause_and_score() {
    let config = EngineConfig::default();
    let current = reading(42.0, 22.1, 1.22, 6.5);
    let hist = history(10, 42.0);
    let peer_history: HashMap<String, Vec<Reading>> = HashMap::new();
    let ctx = ScoringContext {
        sensor_ref: "s".to_string(),
        current: &current,
        history: &hist,
        peer_latest: &[],
        peer_history: &peer_history,
        recent_trust: &[],
        peer_latest_scores: &[],
    };
    let result = scorer::score(&config, &ctx, "now".to_string()).unwrap();
    let moisture = result.param_trust(Parameter::Moisture).unwrap();
    assert_eq!(moisture.axes.temporal_cause, RootCause::Static);
    assert_eq!(moisture.axes.temporal, 0.2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any value strictly outside a probe's hard bounds is classified
    /// `ImpossibleValue`, regardless of which probe it is or the exact
    /// out-of-bounds magnitude.
    #[test]
    fn prop_out_of_bounds_probe_is_always_impossible_value(
        p in prop::sample::select(Parameter::ALL.to_vec()),
        history in generators::reading_history(6),
    ) {
        let config = EngineConfig::default();
        let bad_value = match p {
            Parameter::Moisture => 200.0,
            Parameter::Temperature => 200.0,
            Parameter::Ec => 200.0,
            Parameter::Ph => 200.0,
        };
        let mut current = reading(30.0, 22.0, 1.2, 6.5);
        match p {
            Parameter::Moisture => current.values.moisture = Some(bad_value),
            Parameter::Temperature => current.values.temperature = Some(bad_value),
            Parameter::Ec => current.values.ec = Some(bad_value),
            Parameter::Ph => current.values.ph = Some(bad_value),
        }
        let peer_history: HashMap<String, Vec<Reading>> = HashMap::new();
        let ctx = ScoringContext {
            sensor_ref: "s".to_string(),
            current: &current,
            history: &history,
            peer_latest: &[],
            peer_history: &peer_history,
            recent_trust: &[],
            peer_latest_scores: &[],
        };
        if let Some(result) = scorer::score(&config, &ctx, "now".to_string()) {
            prop_assert!(result.root_causes.contains(RootCause::ImpossibleValue));
        }
    }
}
