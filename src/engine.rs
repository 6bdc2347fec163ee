//! `Engine`: the in-process facade wiring Store + Scorer + Ingestor +
//! TicketManager + Broadcaster behind the Command table of §6. This is the
//! surface a transport adapter (HTTP, WebSocket, CLI) would sit on top of;
//! the adapter itself is out of scope for this crate.

use std::sync::Arc;

use crate::aggregation::{self, DashboardSummary, HealthCategory, ZoneStatEntry};
use crate::broadcaster::{Broadcaster, Receiver, SubscriptionHandle};
use crate::config::EngineConfig;
use crate::cursor::{decode_cursor, encode_cursor, CursorError};
use crate::domain::{Reading, Sensor, SensorRef, Ticket, TicketRef, TicketStatus, TrustResult};
use crate::error::{CoreError, StoreError};
use crate::id_generator::{IdGenerator, RandomIdGenerator};
use crate::ingestor::{IngestOutcome, Ingestor, ReadingPayload};
use crate::store::{InMemoryStore, Store};
use crate::ticket_manager::TicketManager;
use crate::time::{Clock, SystemClock};
use crate::validators;

/// A sensor plus the read-side facts `GetSensor`/`ListSensors` bundle with
/// it (§6): its latest reading, its latest verdict, the teacher-derived
/// health category (§E of SPEC_FULL.md), and its recent ingest-time errors.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorView {
    pub sensor: Sensor,
    pub latest_reading: Option<Reading>,
    pub latest_trust: Option<TrustResult>,
    pub health: HealthCategory,
    pub recent_errors: Vec<crate::domain::ErrorRecord>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Wires the five components together behind §6's Command table. Owns the
/// Store, Broadcaster, configuration, id generator and clock for the
/// lifetime of the process; Ingestor and TicketManager are cheap to
/// construct fresh per call since they only borrow these.
pub struct Engine {
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
    config: EngineConfig,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Builds an `Engine` over the production `InMemoryStore`, a random id
    /// generator and the system clock, validating `config` first.
    pub fn new(config: EngineConfig) -> Result<Self, crate::config::ConfigError> {
        config.validate()?;
        Ok(Engine {
            store: Arc::new(InMemoryStore::new()),
            broadcaster: Broadcaster::new(),
            config,
            id_generator: Arc::new(RandomIdGenerator::new()),
            clock: Arc::new(SystemClock::new()),
        })
    }

    /// Builds an `Engine` over injected collaborators, for deterministic
    /// tests.
    pub fn with_collaborators(
        store: Arc<dyn Store>,
        config: EngineConfig,
        id_generator: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, crate::config::ConfigError> {
        config.validate()?;
        Ok(Engine { store, broadcaster: Broadcaster::new(), config, id_generator, clock })
    }

    fn ingestor(&self, ticket_manager: &TicketManager<'_>) -> Ingestor<'_> {
        Ingestor::new(
            self.store.as_ref(),
            &self.broadcaster,
            ticket_manager,
            &self.config,
            self.id_generator.as_ref(),
            self.clock.as_ref(),
        )
    }

    fn ticket_manager(&self) -> TicketManager<'_> {
        TicketManager::new(self.store.as_ref(), &self.broadcaster, self.id_generator.as_ref(), self.clock.as_ref())
    }

    /// `RegisterSensor` (§6).
    pub async fn register_sensor(
        &self,
        external_id: &str,
        zone: &str,
        sensor_type: &str,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<SensorRef, CoreError> {
        validators::validate_external_id(external_id).map_err(|e| CoreError::InvalidReading(e.to_string()))?;
        validators::validate_zone(zone).map_err(|e| CoreError::InvalidReading(e.to_string()))?;
        validators::validate_sensor_type(sensor_type).map_err(|e| CoreError::InvalidReading(e.to_string()))?;
        validators::validate_coordinates(lat, lon).map_err(|e| CoreError::InvalidReading(e.to_string()))?;

        match self.store.register_sensor(external_id, zone, sensor_type, lat, lon, self.clock.as_ref()).await {
            Ok(sensor_ref) => Ok(sensor_ref),
            Err(StoreError::Duplicate(id)) => Err(CoreError::DuplicateId(id)),
            Err(e) => Err(CoreError::StoreError(e)),
        }
    }

    /// `IngestReading` (§6).
    pub async fn ingest_reading(&self, external_id: &str, payload: ReadingPayload) -> Result<IngestOutcome, CoreError> {
        let ticket_manager = self.ticket_manager();
        self.ingestor(&ticket_manager).ingest(external_id, payload).await
    }

    /// `IngestBatch` (§6): a failure of one item does not abort the others.
    pub async fn ingest_batch(&self, items: Vec<(String, ReadingPayload)>) -> Vec<Result<IngestOutcome, CoreError>> {
        let ticket_manager = self.ticket_manager();
        self.ingestor(&ticket_manager).ingest_batch(items).await
    }

    async fn resolve_external_id(&self, external_id: &str) -> Result<SensorRef, CoreError> {
        self.store
            .list_sensors()
            .await
            .into_iter()
            .find(|s| s.external_id == external_id)
            .map(|s| s.sensor_ref)
            .ok_or_else(|| CoreError::UnknownSensor(external_id.to_string()))
    }

    async fn sensor_view(&self, sensor: Sensor) -> Result<SensorView, CoreError> {
        let latest_reading = self.store.recent_readings(&sensor.sensor_ref, 1).await?.into_iter().next();
        let latest_trust = self.store.recent_trust_results(&sensor.sensor_ref, 1).await?.into_iter().next();
        let recent_errors = self.store.recent_errors(&sensor.sensor_ref).await;
        let now_ms = self.clock.now_epoch_millis();
        let last_error_at_ms = recent_errors.last().and_then(|e| {
            chrono::DateTime::parse_from_rfc3339(&e.timestamp).ok().map(|t| t.timestamp_millis())
        });
        let health = aggregation::health_category(latest_reading.as_ref().map(|r| r.timestamp), last_error_at_ms, now_ms);
        Ok(SensorView { sensor, latest_reading, latest_trust, health, recent_errors })
    }

    /// `GetSensor` (§6).
    pub async fn get_sensor(&self, sensor_ref: &SensorRef) -> Result<SensorView, CoreError> {
        let sensor = self.store.get_sensor(sensor_ref).await?;
        self.sensor_view(sensor).await
    }

    /// `GetSensor` keyed by `externalId`, the identity callers outside the
    /// Store actually hold (§3).
    pub async fn get_sensor_by_external_id(&self, external_id: &str) -> Result<SensorView, CoreError> {
        let sensor_ref = self.resolve_external_id(external_id).await?;
        self.get_sensor(&sensor_ref).await
    }

    /// `ListSensors` (§6), cursor-paginated (§E of SPEC_FULL.md).
    pub async fn list_sensors(&self, cursor: Option<&str>, limit: usize) -> Result<Page<SensorView>, CoreError> {
        let mut sensors = self.store.list_sensors().await;
        sensors.sort_by(|a, b| a.sensor_ref.cmp(&b.sensor_ref));

        let start = match cursor {
            None => 0,
            Some(c) => {
                let decoded = decode_cursor(c).map_err(|e: CursorError| CoreError::InvalidReading(e.to_string()))?;
                sensors.iter().position(|s| s.sensor_ref > decoded.last_ref).unwrap_or(sensors.len())
            }
        };

        let page: Vec<Sensor> = sensors.iter().skip(start).take(limit).cloned().collect();
        let next_cursor = if start + page.len() < sensors.len() {
            page.last().map(|s| encode_cursor(&s.sensor_ref, &s.sensor_ref)).transpose()
                .map_err(|e| CoreError::StoreError(StoreError::Backend(e.to_string())))?
        } else {
            None
        };

        let mut items = Vec::with_capacity(page.len());
        for sensor in page {
            items.push(self.sensor_view(sensor).await?);
        }
        Ok(Page { items, next_cursor })
    }

    /// `GetTrustHistory` (§6).
    pub async fn get_trust_history(&self, sensor_ref: &SensorRef, limit: usize) -> Result<Vec<TrustResult>, CoreError> {
        Ok(self.store.recent_trust_results(sensor_ref, limit).await?)
    }

    /// `DashboardSummary` (§6).
    pub async fn dashboard_summary(&self) -> DashboardSummary {
        aggregation::dashboard_summary(self.store.as_ref()).await
    }

    /// `ZoneStatistics` (§6).
    pub async fn zone_statistics(&self) -> Vec<ZoneStatEntry> {
        aggregation::zone_statistics(self.store.as_ref()).await
    }

    /// `ListTickets` (§6), cursor-paginated (§E of SPEC_FULL.md).
    pub async fn list_tickets(
        &self,
        status_filter: Option<TicketStatus>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page<Ticket>, CoreError> {
        let tickets = self.store.list_tickets(status_filter).await;

        let start = match cursor {
            None => 0,
            Some(c) => {
                let decoded = decode_cursor(c).map_err(|e: CursorError| CoreError::InvalidReading(e.to_string()))?;
                tickets
                    .iter()
                    .position(|t| (t.created_at.as_str(), t.ticket_ref.as_str()) > (decoded.last_sort_key.as_str(), decoded.last_ref.as_str()))
                    .unwrap_or(tickets.len())
            }
        };

        let page: Vec<Ticket> = tickets.iter().skip(start).take(limit).cloned().collect();
        let next_cursor = if start + page.len() < tickets.len() {
            page.last()
                .map(|t| encode_cursor(&t.ticket_ref, &t.created_at))
                .transpose()
                .map_err(|e| CoreError::StoreError(StoreError::Backend(e.to_string())))?
        } else {
            None
        };

        Ok(Page { items: page, next_cursor })
    }

    /// `UpdateTicket` (§6).
    pub async fn update_ticket(&self, ticket_ref: &TicketRef, new_status: TicketStatus) -> Result<Ticket, CoreError> {
        self.ticket_manager()
            .update_status(ticket_ref, new_status)
            .await
            .map_err(|e| match e {
                crate::ticket_manager::TicketError::Store(se) => CoreError::StoreError(se),
                other => CoreError::InvalidReading(other.to_string()),
            })
    }

    /// Subscribes to every topic (§4.E).
    pub async fn subscribe(&self) -> (SubscriptionHandle, Receiver) {
        self.broadcaster.subscribe().await
    }

    /// Subscribes filtered to one sensor's `reading.new`/`trust.updated`
    /// events, plus the two global-only topics (§4.E).
    pub async fn subscribe_sensor(&self, sensor_ref: SensorRef) -> (SubscriptionHandle, Receiver) {
        self.broadcaster.subscribe_sensor(sensor_ref).await
    }

    pub async fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.broadcaster.unsubscribe(handle).await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
