//! Property test: Scorer output invariants (spec §8 "Invariants").
//!
//! For any valid reading and any history of at least 5 valid priors, the
//! resulting TrustResult satisfies:
//! - `score` in [0, 1] and equals the unweighted mean of the per-parameter
//!   trusts, within 1e-4.
//! - `rootCauses` is non-empty and contains `Normal` iff it is the only
//!   element.
//! - `status`/`label` is the unique band the configured thresholds assign
//!   to `score`.

use std::collections::HashMap;

use proptest::prelude::*;
use soil_trust_engine::config::EngineConfig;
use soil_trust_engine::domain::{RootCause, Status};
use soil_trust_engine::scorer::{self, ScoringContext};
use soil_trust_engine::test_utils::generators;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_score_in_bounds_and_equals_mean_of_per_parameter(
        current in generators::reading(),
        history in generators::reading_history(8),
    ) {
        let config = EngineConfig::default();
        let peer_history: HashMap<String, Vec<_>> = HashMap::new();
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
            prop_assert!(result.score >= 0.0 && result.score <= 1.0);

            let sum: f64 = result.per_parameter.iter().map(|(_, t)| t.trust).sum();
            let mean = sum / result.per_parameter.len() as f64;
            prop_assert!(
                (result.score - mean).abs() < 1e-4,
                "score {} should equal mean of per-parameter trusts {}",
                result.score,
                mean
            );

            prop_assert!(!result.root_causes.as_slice().is_empty());
            let is_normal_only = result.root_causes.is_normal_only();
            let contains_normal = result.root_causes.contains(RootCause::Normal);
            prop_assert_eq!(is_normal_only, contains_normal);
        }
    }

    #[test]
    fn prop_status_label_matches_configured_bands(
        current in generators::reading(),
        history in generators::reading_history(8),
    ) {
        let config = EngineConfig::default();
        let peer_history: HashMap<String, Vec<_>> = HashMap::new();
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
            let bands = &config.trust_bands;
            let (expected_status, expected_label) = if result.score >= bands.highly_reliable {
                (Status::Healthy, "Highly Reliable")
            } else if result.score >= bands.reliable {
                (Status::Healthy, "Reliable")
            } else if result.score >= bands.uncertain {
                (Status::Warning, "Uncertain")
            } else if result.score >= bands.unreliable {
                (Status::Anomalous, "Unreliable")
            } else {
                (Status::Anomalous, "Anomaly")
            };
            prop_assert_eq!(result.status, expected_status);
            prop_assert_eq!(result.label, expected_label);
        }
    }
}
