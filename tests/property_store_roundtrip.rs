//! Property test: Store round-trip (spec §8 "Round-trip / idempotence").
//!
//! `appendReading` then `recentReadings(n)` returns the just-appended
//! reading at position 0 (newest-first) for all `n >= 1`.

use proptest::prelude::*;
use soil_trust_engine::domain::{Reading, ReadingContext, ReadingValues};
use soil_trust_engine::store::{InMemoryStore, Store};
use soil_trust_engine::test_utils::generators;
use soil_trust_engine::time::FixedClock;

fn mk_reading(reading_ref: &str, sensor_ref: &str, moisture: f64) -> Reading {
    Reading {
        reading_ref: reading_ref.to_string(),
        sensor_ref: sensor_ref.to_string(),
        timestamp: 1,
        values: ReadingValues { moisture: Some(moisture), ..Default::default() },
        context: ReadingContext::default(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_append_then_recent_returns_newest_first(
        external_id in generators::external_id(),
        zone in generators::zone(),
        moisture in generators::moisture_value(),
        n in 1usize..10,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryStore::new();
            let clock = FixedClock::from_epoch_millis(1_700_000_000_000);
            let sensor_ref = store
                .register_sensor(&external_id, &zone, "soil-10hs", None, None, &clock)
                .await
                .unwrap();

            store.append_reading(&sensor_ref, mk_reading("prior-1", &sensor_ref, 10.0)).await.unwrap();
            store.append_reading(&sensor_ref, mk_reading("prior-2", &sensor_ref, 20.0)).await.unwrap();
            store
                .append_reading(&sensor_ref, mk_reading("latest", &sensor_ref, moisture))
                .await
                .unwrap();

            let recent = store.recent_readings(&sensor_ref, n).await.unwrap();
            prop_assert_eq!(recent[0].reading_ref.as_str(), "latest");
            prop_assert!(recent.len() <= n);
            Ok(())
        })?;
    }
}
