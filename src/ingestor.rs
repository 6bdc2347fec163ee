//! The Ingestor (§4.C): validates a reading, writes it, invokes the
//! Scorer, persists the verdict, and — when the sensor is Anomalous for
//! real reasons — hands off to the Ticket Manager.

use crate::broadcaster::Broadcaster;
use crate::config::EngineConfig;
use crate::domain::{ErrorRecord, Reading, ReadingContext, ReadingValues, RootCause, SensorRef, Status, TrustResult};
use crate::error::{error_codes, CoreError};
use crate::id_generator::IdGenerator;
use crate::scorer::{self, ScoringContext};
use crate::store::Store;
use crate::ticket_manager::TicketManager;
use crate::time::Clock;

/// Checks a single optional probe for the one thing that can make a field
/// genuinely unstorable: not being a finite number. Values that are finite
/// but outside physical range are left alone — the Scorer is the authority
/// on those (§4.C policy note).
fn reject_non_finite(field: &str, value: Option<f64>) -> Result<(), CoreError> {
    match value {
        Some(v) if !v.is_finite() => Err(CoreError::InvalidReading(format!(
            "{} is not a finite number: {}",
            field, v
        ))),
        _ => Ok(()),
    }
}

/// Raw-shape staleness heuristic, carried over from the teacher's
/// `sensor_validation::is_stale`: the last six values of a probe are all
/// within 0.001 of the first. This is a diagnostic annotation only — it
/// never overrides the Scorer's own Static classification (§4.B), which
/// runs on a wider window with its own threshold per probe.
fn is_stale(recent_values_newest_first: &[f64]) -> bool {
    if recent_values_newest_first.len() < 6 {
        return false;
    }
    let last_six = &recent_values_newest_first[..6];
    let first = last_six[0];
    last_six.iter().all(|v| (v - first).abs() < 0.001)
}

/// Raw-shape noise heuristic, carried over from the teacher's
/// `sensor_validation::is_noisy`: more than 50% change since the previous
/// value. Diagnostic only, distinct from the Scorer's own Spike bands.
fn is_noisy(prev_value: f64, current_value: f64) -> bool {
    if prev_value == 0.0 {
        return false;
    }
    ((current_value - prev_value).abs() / prev_value.abs()) * 100.0 > 50.0
}

/// Folds the teacher's raw-shape pre-classification into human-readable
/// flags, one entry per probe that trips either heuristic. Appended
/// alongside the Scorer's own flags; it does not feed back into score,
/// status, severity or root causes.
fn noise_and_staleness_flags(prior_history_newest_first: &[Reading], current: &Reading) -> Vec<String> {
    use crate::domain::Parameter;
    let mut flags = Vec::new();
    for p in Parameter::ALL {
        let Some(current_value) = current.value(p) else { continue };
        let own_history: Vec<f64> = prior_history_newest_first.iter().filter_map(|r| r.value(p)).collect();

        if is_stale(&own_history) {
            flags.push(format!(
                "{}: raw-shape staleness heuristic flagged (no variation across last 6 readings)",
                p.as_str()
            ));
        }
        if let Some(prev_value) = own_history.first() {
            if is_noisy(*prev_value, current_value) {
                flags.push(format!(
                    "{}: raw-shape noise heuristic flagged (>50% change since previous reading)",
                    p.as_str()
                ));
            }
        }
    }
    flags
}

/// Inbound payload for one reading. Probe fields are `Option<f64>` at this
/// boundary because a transport adapter may omit a probe entirely; a field
/// that is present but failed to parse as a number is the adapter's job to
/// reject before it reaches here (§4.C's `InvalidReading` is about fields
/// that could not even be stored, not fields outside physical range).
#[derive(Debug, Clone, Default)]
pub struct ReadingPayload {
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub ec: Option<f64>,
    pub ph: Option<f64>,
    pub air_temp: Option<f64>,
    pub is_raining: Option<bool>,
    pub irrigation_active: Option<bool>,
}

/// Outcome of one `ingest` call.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub reading_ref: String,
    /// `None` when the Scorer short-circuited on insufficient history.
    pub trust_result: Option<TrustResult>,
}

const RECENT_READINGS_N: usize = 11;
const DRIFT_WINDOW_N: usize = 21;
const TRUST_HISTORY_N: usize = 10;

pub struct Ingestor<'a> {
    store: &'a dyn Store,
    broadcaster: &'a Broadcaster,
    ticket_manager: &'a TicketManager<'a>,
    config: &'a EngineConfig,
    id_generator: &'a dyn IdGenerator,
    clock: &'a dyn Clock,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a dyn Store,
        broadcaster: &'a Broadcaster,
        ticket_manager: &'a TicketManager<'a>,
        config: &'a EngineConfig,
        id_generator: &'a dyn IdGenerator,
        clock: &'a dyn Clock,
    ) -> Self {
        Ingestor { store, broadcaster, ticket_manager, config, id_generator, clock }
    }

    /// §4.C's sequence, serialised per sensor via the Store's keyed lock.
    pub async fn ingest(&self, external_id: &str, payload: ReadingPayload) -> Result<IngestOutcome, CoreError> {
        reject_non_finite("moisture", payload.moisture)?;
        reject_non_finite("temperature", payload.temperature)?;
        reject_non_finite("ec", payload.ec)?;
        reject_non_finite("ph", payload.ph)?;
        reject_non_finite("airTemp", payload.air_temp)?;

        let sensor = self.resolve_sensor(external_id).await?;
        let sensor_ref = sensor.sensor_ref.clone();

        let lock = self.store.sensor_lock(&sensor_ref).await;
        let _guard = lock.lock().await;

        let reading = Reading {
            reading_ref: self.id_generator.uuid_v4(),
            sensor_ref: sensor_ref.clone(),
            timestamp: self.clock.now_epoch_millis(),
            values: ReadingValues {
                moisture: payload.moisture,
                temperature: payload.temperature,
                ec: payload.ec,
                ph: payload.ph,
            },
            context: ReadingContext {
                air_temp: payload.air_temp,
                is_raining: payload.is_raining,
                irrigation_active: payload.irrigation_active,
            },
        };

        let reading_ref = self.store.append_reading(&sensor_ref, reading.clone()).await?;
        tracing::info!(sensor_ref = %sensor_ref, reading_ref = %reading_ref, "reading appended");
        self.broadcaster.publish_reading_new(&sensor_ref, &reading_ref).await;

        let history = self.store.recent_readings(&sensor_ref, DRIFT_WINDOW_N).await?;
        // history includes the reading we just appended at index 0; the
        // Scorer wants the *prior* readings, newest-first.
        let prior_history: Vec<Reading> = history.into_iter().skip(1).take(RECENT_READINGS_N.max(DRIFT_WINDOW_N) - 1).collect();

        if prior_history.len() < 5 {
            tracing::info!(sensor_ref = %sensor_ref, "insufficient history, skipping scoring");
            return Ok(IngestOutcome { reading_ref, trust_result: None });
        }

        let peer_latest = self.store.latest_reading_per_sensor(&sensor.zone, &sensor_ref).await;
        let peer_history = self.store.recent_readings_by_sensor(&sensor.zone, &sensor_ref, RECENT_READINGS_N).await;
        let recent_trust = self.store.recent_trust_results(&sensor_ref, TRUST_HISTORY_N).await?;

        let peer_refs: Vec<SensorRef> = peer_latest.iter().map(|(s, _)| s.clone()).collect();
        let latest_trust_per_sensor = self.store.latest_trust_per_sensor().await;
        let peer_latest_scores: Vec<f64> =
            peer_refs.iter().filter_map(|s| latest_trust_per_sensor.get(s).map(|t| t.score)).collect();

        let ctx = ScoringContext {
            sensor_ref: sensor_ref.clone(),
            current: &reading,
            history: &prior_history,
            peer_latest: &peer_latest,
            peer_history: &peer_history,
            recent_trust: &recent_trust,
            peer_latest_scores: &peer_latest_scores,
        };

        let Some(mut result) = scorer::score(self.config, &ctx, self.clock.now_rfc3339()) else {
            tracing::info!(sensor_ref = %sensor_ref, "scorer returned no verdict");
            return Ok(IngestOutcome { reading_ref, trust_result: None });
        };

        result.flags.extend(noise_and_staleness_flags(&prior_history, &reading));

        if result.root_causes.contains(RootCause::ImpossibleValue) {
            self.store
                .record_error(
                    &sensor_ref,
                    ErrorRecord {
                        timestamp: self.clock.now_rfc3339(),
                        code: error_codes::INVALID_READING,
                        message: "reading contained a physically impossible value".to_string(),
                    },
                )
                .await;
        }

        self.store.save_trust_result(result.clone()).await?;
        tracing::info!(
            sensor_ref = %sensor_ref,
            score = result.score,
            status = ?result.status,
            "trust result persisted"
        );
        self.broadcaster.publish_trust_updated(&result).await;
        self.broadcaster.publish_dashboard_update().await;

        if result.status == Status::Anomalous && !result.root_causes.contains(RootCause::FieldEvent) {
            let diagnostic = describe_diagnostic(&result);
            if let Err(e) = self.ticket_manager.on_anomalous(&sensor_ref, &diagnostic, result.severity).await {
                // §7: Ticket Manager errors during onAnomalous are logged
                // and do not fail the ingest; the TrustResult is already
                // the primary record and has been persisted above.
                tracing::error!(sensor_ref = %sensor_ref, error = %e, "failed to open/update ticket");
            }
        }

        Ok(IngestOutcome { reading_ref, trust_result: Some(result) })
    }

    /// Sequential thin wrapper: one item's failure does not abort the rest.
    pub async fn ingest_batch(
        &self,
        items: Vec<(String, ReadingPayload)>,
    ) -> Vec<Result<IngestOutcome, CoreError>> {
        let mut outcomes = Vec::with_capacity(items.len());
        for (external_id, payload) in items {
            outcomes.push(self.ingest(&external_id, payload).await);
        }
        outcomes
    }

    async fn resolve_sensor(&self, external_id: &str) -> Result<crate::domain::Sensor, CoreError> {
        let sensors = self.store.list_sensors().await;
        sensors
            .into_iter()
            .find(|s| s.external_id == external_id)
            .ok_or_else(|| CoreError::UnknownSensor(external_id.to_string()))
    }
}

fn describe_diagnostic(result: &TrustResult) -> String {
    let causes: Vec<&str> = result.root_causes.iter().map(|c| root_cause_label(*c)).collect();
    format!("trust score {:.2} ({})", result.score, causes.join(", "))
}

fn root_cause_label(cause: RootCause) -> &'static str {
    match cause {
        RootCause::Normal => "normal",
        RootCause::Spike => "spike",
        RootCause::Static => "static probe",
        RootCause::Drift => "drift",
        RootCause::ZoneMismatch => "zone mismatch",
        RootCause::WeatherMismatch => "weather mismatch",
        RootCause::FieldEvent => "field event",
        RootCause::ImpossibleValue => "impossible value",
    }
}

#[cfg(test)]
mod noise_staleness_tests {
    use super::*;
    use crate::domain::{ReadingContext, ReadingValues};

    fn reading(moisture: f64) -> Reading {
        Reading {
            reading_ref: "r".to_string(),
            sensor_ref: "s".to_string(),
            timestamp: 0,
            values: ReadingValues { moisture: Some(moisture), ..Default::default() },
            context: ReadingContext::default(),
        }
    }

    #[test]
    fn flags_six_identical_priors_as_stale() {
        let history: Vec<Reading> = (0..6).map(|_| reading(42.0)).collect();
        let current = reading(42.0);
        let flags = noise_and_staleness_flags(&history, &current);
        assert!(flags.iter().any(|f| f.contains("staleness")));
    }

    #[test]
    fn flags_large_jump_as_noisy() {
        let history: Vec<Reading> = (0..6).map(|_| reading(20.0)).collect();
        let current = reading(40.0);
        let flags = noise_and_staleness_flags(&history, &current);
        assert!(flags.iter().any(|f| f.contains("noise")));
    }

    #[test]
    fn no_flags_for_steady_varying_history() {
        let history = vec![reading(30.0), reading(30.5), reading(29.5), reading(30.2), reading(29.8), reading(30.1)];
        let current = reading(30.3);
        assert!(noise_and_staleness_flags(&history, &current).is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_generator::FixedIdGenerator;
    use crate::store::InMemoryStore;
    use crate::time::FixedClock;

    struct Harness {
        store: InMemoryStore,
        broadcaster: Broadcaster,
        id_generator: FixedIdGenerator,
        clock: FixedClock,
        config: EngineConfig,
    }

    impl Harness {
        async fn new() -> (Self, SensorRef) {
            let store = InMemoryStore::new();
            let broadcaster = Broadcaster::new();
            let id_generator = FixedIdGenerator::new(
                (0..64).map(|i| format!("reading-{}", i)).collect(),
            );
            let clock = FixedClock::from_epoch_millis(1_700_000_000_000);
            let config = EngineConfig::default();
            let sensor_ref = store.register_sensor("ext-a", "z1", "soil", None, None, &clock).await.unwrap();
            (Harness { store, broadcaster, id_generator, clock, config }, sensor_ref)
        }

        fn ingestor<'a>(&'a self, ticket_manager: &'a TicketManager<'a>) -> Ingestor<'a> {
            Ingestor::new(&self.store, &self.broadcaster, ticket_manager, &self.config, &self.id_generator, &self.clock)
        }
    }

    fn payload(moisture: f64) -> ReadingPayload {
        ReadingPayload { moisture: Some(moisture), temperature: Some(22.0), ec: Some(1.2), ph: Some(6.5), ..Default::default() }
    }

    #[tokio::test]
    async fn unknown_sensor_is_rejected() {
        let (harness, _sensor_ref) = Harness::new().await;
        let ticket_manager = TicketManager::new(&harness.store, &harness.broadcaster, &harness.id_generator, &harness.clock);
        let ingestor = harness.ingestor(&ticket_manager);
        let result = ingestor.ingest("does-not-exist", payload(30.0)).await;
        assert!(matches!(result, Err(CoreError::UnknownSensor(_))));
    }

    #[tokio::test]
    async fn insufficient_history_still_appends_and_emits_reading_new() {
        let (harness, _sensor_ref) = Harness::new().await;
        let ticket_manager = TicketManager::new(&harness.store, &harness.broadcaster, &harness.id_generator, &harness.clock);
        let ingestor = harness.ingestor(&ticket_manager);
        let (_handle, mut rx) = harness.broadcaster.subscribe().await;

        let outcome = ingestor.ingest("ext-a", payload(30.0)).await.unwrap();
        assert!(outcome.trust_result.is_none());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, crate::broadcaster::EventKind::ReadingNew);
    }

    #[tokio::test]
    async fn sufficient_history_produces_trust_result_and_persists_it() {
        let (harness, sensor_ref) = Harness::new().await;
        let ticket_manager = TicketManager::new(&harness.store, &harness.broadcaster, &harness.id_generator, &harness.clock);
        let ingestor = harness.ingestor(&ticket_manager);

        for _ in 0..5 {
            ingestor.ingest("ext-a", payload(30.0)).await.unwrap();
        }
        let outcome = ingestor.ingest("ext-a", payload(30.2)).await.unwrap();
        assert!(outcome.trust_result.is_some());

        let stored = harness.store.recent_trust_results(&sensor_ref, 10).await.unwrap();
        // initial seed verdict + the one just produced.
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn anomalous_status_opens_a_ticket() {
        let (harness, _sensor_ref) = Harness::new().await;
        let ticket_manager = TicketManager::new(&harness.store, &harness.broadcaster, &harness.id_generator, &harness.clock);
        let ingestor = harness.ingestor(&ticket_manager);

        for _ in 0..6 {
            ingestor.ingest("ext-a", payload(30.0)).await.unwrap();
        }
        ingestor.ingest("ext-a", payload(92.0)).await.unwrap();

        let tickets = ticket_manager.list(None).await;
        assert_eq!(tickets.len(), 1);
    }

    #[tokio::test]
    async fn batch_ingest_continues_past_one_failure() {
        let (harness, _sensor_ref) = Harness::new().await;
        let ticket_manager = TicketManager::new(&harness.store, &harness.broadcaster, &harness.id_generator, &harness.clock);
        let ingestor = harness.ingestor(&ticket_manager);

        let items = vec![
            ("ext-a".to_string(), payload(30.0)),
            ("missing".to_string(), payload(30.0)),
            ("ext-a".to_string(), payload(30.1)),
        ];
        let outcomes = ingestor.ingest_batch(items).await;
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_err());
        assert!(outcomes[2].is_ok());
    }

    #[tokio::test]
    async fn non_finite_probe_is_rejected_before_persistence() {
        let (harness, sensor_ref) = Harness::new().await;
        let ticket_manager = TicketManager::new(&harness.store, &harness.broadcaster, &harness.id_generator, &harness.clock);
        let ingestor = harness.ingestor(&ticket_manager);

        let mut bad = payload(30.0);
        bad.moisture = Some(f64::NAN);
        let result = ingestor.ingest("ext-a", bad).await;
        assert!(matches!(result, Err(CoreError::InvalidReading(_))));

        let stored = harness.store.recent_readings(&sensor_ref, 10).await.unwrap();
        assert!(stored.is_empty(), "a rejected reading must not be stored");
    }
}
