//! Property test: Ticket invariant (spec §8 "Invariants").
//!
//! At any time, each sensor has at most one `Open` ticket, no matter how
//! many times it is driven into an anomalous state in a row.

use std::sync::Arc;

use proptest::prelude::*;
use soil_trust_engine::config::EngineConfig;
use soil_trust_engine::domain::TicketStatus;
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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_at_most_one_open_ticket_per_sensor_under_repeated_anomalies(
        spike_count in 1usize..8,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
            let id_generator: Arc<dyn IdGenerator> =
                Arc::new(FixedIdGenerator::new((0..256).map(|i| format!("id-{}", i)).collect()));
            let clock: Arc<dyn Clock> = Arc::new(FixedClock::from_epoch_millis(1_700_000_000_000));
            let engine = Engine::with_collaborators(store, EngineConfig::default(), id_generator, clock).unwrap();

            engine.register_sensor("ext-1", "z1", "soil-10hs", None, None).await.unwrap();
            for _ in 0..6 {
                engine.ingest_reading("ext-1", payload(30.0)).await.unwrap();
            }
            for _ in 0..spike_count {
                engine.ingest_reading("ext-1", payload(92.0)).await.unwrap();
            }

            let open = engine.list_tickets(Some(TicketStatus::Open), None, 100).await.unwrap();
            prop_assert!(open.items.len() <= 1);
            Ok(())
        })?;
    }
}
