//! The Store (§4.A): persists sensors, readings, trust results and tickets,
//! and supplies the history windows the Scorer needs.
//!
//! `InMemoryStore` keeps all state behind one `tokio::sync::RwLock`, so a
//! read of "this sensor's recent readings + its peers' latest readings" is
//! a single atomic snapshot (§5) rather than several locks taken in
//! sequence. A separate keyed-mutex table gives the Ingestor and Ticket
//! Manager the per-sensor serialization §5 and §9 call for, without
//! serializing unrelated sensors against each other.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::{ErrorRecord, Reading, ReadingRef, Sensor, SensorRef, Ticket, TicketRef, TicketStatus, TrustResult};
use crate::error::StoreError;
use crate::time::Clock;

const ERROR_RING_CAPACITY: usize = 10;

#[async_trait]
pub trait Store: Send + Sync {
    async fn register_sensor(
        &self,
        external_id: &str,
        zone: &str,
        sensor_type: &str,
        lat: Option<f64>,
        lon: Option<f64>,
        clock: &dyn Clock,
    ) -> Result<SensorRef, StoreError>;

    async fn get_sensor(&self, sensor_ref: &SensorRef) -> Result<Sensor, StoreError>;

    async fn list_sensors(&self) -> Vec<Sensor>;

    async fn append_reading(&self, sensor_ref: &SensorRef, reading: Reading) -> Result<ReadingRef, StoreError>;

    /// Newest-first, length <= n.
    async fn recent_readings(&self, sensor_ref: &SensorRef, n: usize) -> Result<Vec<Reading>, StoreError>;

    /// Each peer sensor's single latest reading, in the given zone, excluding `sensor_ref`.
    async fn latest_reading_per_sensor(&self, zone: &str, excluding: &SensorRef) -> Vec<(SensorRef, Reading)>;

    /// Each peer sensor's recent reading history, in the given zone, excluding `sensor_ref`.
    async fn recent_readings_by_sensor(
        &self,
        zone: &str,
        excluding: &SensorRef,
        n: usize,
    ) -> HashMap<SensorRef, Vec<Reading>>;

    /// Newest-first.
    async fn recent_trust_results(&self, sensor_ref: &SensorRef, n: usize) -> Result<Vec<TrustResult>, StoreError>;

    async fn save_trust_result(&self, result: TrustResult) -> Result<(), StoreError>;

    async fn latest_trust_per_sensor(&self) -> HashMap<SensorRef, TrustResult>;

    async fn open_ticket_for_sensor(&self, sensor_ref: &SensorRef) -> Option<Ticket>;

    async fn save_ticket(&self, ticket: Ticket) -> Result<(), StoreError>;

    async fn get_ticket(&self, ticket_ref: &TicketRef) -> Result<Ticket, StoreError>;

    async fn list_tickets(&self, status_filter: Option<TicketStatus>) -> Vec<Ticket>;

    async fn record_error(&self, sensor_ref: &SensorRef, record: ErrorRecord);

    async fn recent_errors(&self, sensor_ref: &SensorRef) -> Vec<ErrorRecord>;

    /// A per-sensor keyed lock. Callers hold its guard across the
    /// append-then-score-then-persist-then-ticket critical section (§5, §9).
    /// Looking up the lock for a never-registered sensor still returns a
    /// valid (if useless) lock rather than panicking, so callers can check
    /// sensor existence under the lock they already hold.
    async fn sensor_lock(&self, sensor_ref: &SensorRef) -> Arc<Mutex<()>>;
}

#[derive(Default)]
struct StoreData {
    sensors: HashMap<SensorRef, Sensor>,
    external_index: HashMap<String, SensorRef>,
    zone_index: HashMap<String, HashSet<SensorRef>>,
    readings: HashMap<SensorRef, VecDeque<Reading>>,
    trust_results: HashMap<SensorRef, VecDeque<TrustResult>>,
    tickets: HashMap<TicketRef, Ticket>,
    open_ticket_by_sensor: HashMap<SensorRef, TicketRef>,
    error_records: HashMap<SensorRef, VecDeque<ErrorRecord>>,
}

/// Concurrent in-process implementation of [`Store`]. Readings and trust
/// results beyond the widest analysis window (`drift_window`, 20 readings)
/// are retained indefinitely here — no pruning policy is implemented, per
/// §3's "the design does not mandate one".
pub struct InMemoryStore {
    data: RwLock<StoreData>,
    sensor_locks: Mutex<HashMap<SensorRef, Arc<Mutex<()>>>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            data: RwLock::new(StoreData::default()),
            sensor_locks: Mutex::new(HashMap::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    fn next_handle(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{}-{:08x}", prefix, n)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn register_sensor(
        &self,
        external_id: &str,
        zone: &str,
        sensor_type: &str,
        lat: Option<f64>,
        lon: Option<f64>,
        clock: &dyn Clock,
    ) -> Result<SensorRef, StoreError> {
        let mut data = self.data.write().await;
        if data.external_index.contains_key(external_id) {
            return Err(StoreError::Duplicate(external_id.to_string()));
        }

        let sensor_ref = self.next_handle("sensor");
        let sensor = Sensor {
            sensor_ref: sensor_ref.clone(),
            external_id: external_id.to_string(),
            zone: zone.to_string(),
            sensor_type: sensor_type.to_string(),
            latitude: lat,
            longitude: lon,
            installed_at: clock.now_rfc3339(),
        };

        data.external_index.insert(external_id.to_string(), sensor_ref.clone());
        data.zone_index.entry(zone.to_string()).or_default().insert(sensor_ref.clone());
        data.sensors.insert(sensor_ref.clone(), sensor);

        let initial = TrustResult::initial(sensor_ref.clone(), clock.now_rfc3339());
        data.trust_results.entry(sensor_ref.clone()).or_default().push_front(initial);

        Ok(sensor_ref)
    }

    async fn get_sensor(&self, sensor_ref: &SensorRef) -> Result<Sensor, StoreError> {
        let data = self.data.read().await;
        data.sensors
            .get(sensor_ref)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(sensor_ref.clone()))
    }

    async fn list_sensors(&self) -> Vec<Sensor> {
        let data = self.data.read().await;
        let mut sensors: Vec<Sensor> = data.sensors.values().cloned().collect();
        sensors.sort_by(|a, b| a.sensor_ref.cmp(&b.sensor_ref));
        sensors
    }

    async fn append_reading(&self, sensor_ref: &SensorRef, reading: Reading) -> Result<ReadingRef, StoreError> {
        let mut data = self.data.write().await;
        if !data.sensors.contains_key(sensor_ref) {
            return Err(StoreError::NotFound(sensor_ref.clone()));
        }
        let reading_ref = reading.reading_ref.clone();
        data.readings.entry(sensor_ref.clone()).or_default().push_front(reading);
        Ok(reading_ref)
    }

    async fn recent_readings(&self, sensor_ref: &SensorRef, n: usize) -> Result<Vec<Reading>, StoreError> {
        let data = self.data.read().await;
        if !data.sensors.contains_key(sensor_ref) {
            return Err(StoreError::NotFound(sensor_ref.clone()));
        }
        Ok(data
            .readings
            .get(sensor_ref)
            .map(|q| q.iter().take(n).cloned().collect())
            .unwrap_or_default())
    }

    async fn latest_reading_per_sensor(&self, zone: &str, excluding: &SensorRef) -> Vec<(SensorRef, Reading)> {
        let data = self.data.read().await;
        let Some(members) = data.zone_index.get(zone) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|s| *s != excluding)
            .filter_map(|s| {
                data.readings
                    .get(s)
                    .and_then(|q| q.front())
                    .map(|r| (s.clone(), r.clone()))
            })
            .collect()
    }

    async fn recent_readings_by_sensor(
        &self,
        zone: &str,
        excluding: &SensorRef,
        n: usize,
    ) -> HashMap<SensorRef, Vec<Reading>> {
        let data = self.data.read().await;
        let Some(members) = data.zone_index.get(zone) else {
            return HashMap::new();
        };
        members
            .iter()
            .filter(|s| *s != excluding)
            .map(|s| {
                let history = data
                    .readings
                    .get(s)
                    .map(|q| q.iter().take(n).cloned().collect())
                    .unwrap_or_default();
                (s.clone(), history)
            })
            .collect()
    }

    async fn recent_trust_results(&self, sensor_ref: &SensorRef, n: usize) -> Result<Vec<TrustResult>, StoreError> {
        let data = self.data.read().await;
        if !data.sensors.contains_key(sensor_ref) {
            return Err(StoreError::NotFound(sensor_ref.clone()));
        }
        Ok(data
            .trust_results
            .get(sensor_ref)
            .map(|q| q.iter().take(n).cloned().collect())
            .unwrap_or_default())
    }

    async fn save_trust_result(&self, result: TrustResult) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        if !data.sensors.contains_key(&result.sensor_ref) {
            return Err(StoreError::NotFound(result.sensor_ref.clone()));
        }
        data.trust_results.entry(result.sensor_ref.clone()).or_default().push_front(result);
        Ok(())
    }

    async fn latest_trust_per_sensor(&self) -> HashMap<SensorRef, TrustResult> {
        let data = self.data.read().await;
        data.trust_results
            .iter()
            .filter_map(|(sensor_ref, q)| q.front().map(|t| (sensor_ref.clone(), t.clone())))
            .collect()
    }

    async fn open_ticket_for_sensor(&self, sensor_ref: &SensorRef) -> Option<Ticket> {
        let data = self.data.read().await;
        data.open_ticket_by_sensor
            .get(sensor_ref)
            .and_then(|ticket_ref| data.tickets.get(ticket_ref))
            .cloned()
    }

    async fn save_ticket(&self, ticket: Ticket) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        match ticket.status {
            TicketStatus::Open => {
                data.open_ticket_by_sensor.insert(ticket.sensor_ref.clone(), ticket.ticket_ref.clone());
            }
            _ => {
                if data.open_ticket_by_sensor.get(&ticket.sensor_ref) == Some(&ticket.ticket_ref) {
                    data.open_ticket_by_sensor.remove(&ticket.sensor_ref);
                }
            }
        }
        data.tickets.insert(ticket.ticket_ref.clone(), ticket);
        Ok(())
    }

    async fn get_ticket(&self, ticket_ref: &TicketRef) -> Result<Ticket, StoreError> {
        let data = self.data.read().await;
        data.tickets
            .get(ticket_ref)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(ticket_ref.clone()))
    }

    async fn list_tickets(&self, status_filter: Option<TicketStatus>) -> Vec<Ticket> {
        let data = self.data.read().await;
        let mut tickets: Vec<Ticket> = data
            .tickets
            .values()
            .filter(|t| status_filter.map(|s| s == t.status).unwrap_or(true))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tickets
    }

    async fn record_error(&self, sensor_ref: &SensorRef, record: ErrorRecord) {
        let mut data = self.data.write().await;
        let ring = data.error_records.entry(sensor_ref.clone()).or_default();
        ring.push_back(record);
        while ring.len() > ERROR_RING_CAPACITY {
            ring.pop_front();
        }
    }

    async fn recent_errors(&self, sensor_ref: &SensorRef) -> Vec<ErrorRecord> {
        let data = self.data.read().await;
        data.error_records.get(sensor_ref).map(|q| q.iter().cloned().collect()).unwrap_or_default()
    }

    async fn sensor_lock(&self, sensor_ref: &SensorRef) -> Arc<Mutex<()>> {
        let mut locks = self.sensor_locks.lock().await;
        locks.entry(sensor_ref.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
