//! Property test: Order independence across sensors (spec §8 "Invariants").
//!
//! For any interleaving of ingests to distinct sensors in distinct zones
//! (so neither influences the other's cross-zone axis), each sensor's own
//! TrustResult sequence is identical to what a serial, single-sensor-at-a-
//! time execution would have produced.

use std::sync::Arc;

use proptest::prelude::*;
use soil_trust_engine::config::EngineConfig;
use soil_trust_engine::engine::Engine;
use soil_trust_engine::id_generator::{FixedIdGenerator, IdGenerator};
use soil_trust_engine::ingestor::ReadingPayload;
use soil_trust_engine::store::{InMemoryStore, Store};
use soil_trust_engine::time::{Clock, FixedClock};

fn payload(moisture: f64) -> ReadingPayload {
    ReadingPayload {
        moisture: Some(moisture),
        temperature: Some(22.0),
        ec: Some(1.2),
        ph: Some(6.5),
        ..Default::default()
    }
}

fn build_engine() -> Engine {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let id_generator: Arc<dyn IdGenerator> =
        Arc::new(FixedIdGenerator::new((0..512).map(|i| format!("id-{}", i)).collect()));
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::from_epoch_millis(1_700_000_000_000));
    Engine::with_collaborators(store, EngineConfig::default(), id_generator, clock).unwrap()
}

/// Runs `a_values` against sensor A and `b_values` against sensor B,
/// visiting them in the order `interleaving` specifies (`true` = A's turn,
/// `false` = B's turn). Returns (A's scores, B's scores) in ingest order.
async fn run_interleaved(a_values: &[f64], b_values: &[f64], interleaving: &[bool]) -> (Vec<f64>, Vec<f64>) {
    let engine = build_engine();
    engine.register_sensor("A", "zone-a", "soil-10hs", None, None).await.unwrap();
    engine.register_sensor("B", "zone-b", "soil-10hs", None, None).await.unwrap();

    let mut a_iter = a_values.iter();
    let mut b_iter = b_values.iter();
    let mut a_scores = Vec::new();
    let mut b_scores = Vec::new();

    for turn in interleaving {
        if *turn {
            if let Some(v) = a_iter.next() {
                let outcome = engine.ingest_reading("A", payload(*v)).await.unwrap();
                if let Some(t) = outcome.trust_result {
                    a_scores.push(t.score);
                }
            }
        } else if let Some(v) = b_iter.next() {
            let outcome = engine.ingest_reading("B", payload(*v)).await.unwrap();
            if let Some(t) = outcome.trust_result {
                b_scores.push(t.score);
            }
        }
    }

    (a_scores, b_scores)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_per_sensor_sequence_is_order_independent_across_sensors(
        a_values in prop::collection::vec(20.0f64..40.0, 8),
        b_values in prop::collection::vec(20.0f64..40.0, 8),
        shuffle_seed in 0u8..4,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let serial: Vec<bool> = (0..8).map(|_| true).chain((0..8).map(|_| false)).collect();
            let (serial_a, serial_b) = run_interleaved(&a_values, &b_values, &serial).await;

            // A handful of fixed alternative interleavings, all visiting
            // each sensor 8 times in its own original value order.
            let alt: Vec<bool> = match shuffle_seed {
                0 => (0..16).map(|i| i % 2 == 0).collect(),
                1 => (0..16).map(|i| i % 4 == 0 || i % 4 == 1).collect(),
                2 => {
                    let mut v = vec![false; 8];
                    v.extend(vec![true; 8]);
                    v
                }
                _ => (0..16).map(|i| (i / 2) % 2 == 0).collect(),
            };
            let (alt_a, alt_b) = run_interleaved(&a_values, &b_values, &alt).await;

            prop_assert_eq!(serial_a, alt_a);
            prop_assert_eq!(serial_b, alt_b);
            Ok(())
        })?;
    }
}
