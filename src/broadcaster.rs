//! The Broadcaster (§4.E): a publish/subscribe fan-out surface over four
//! topics. Delivery is best-effort — a subscriber that falls behind has its
//! oldest pending events dropped rather than blocking the ingest path.
//!
//! `tokio::sync::mpsc`/`broadcast` do not expose a way to pop the oldest
//! queued item when a bounded channel is full, which is exactly what §4.E's
//! discard-oldest policy needs. Each subscriber therefore gets its own
//! `VecDeque` behind a `tokio::sync::Mutex`, woken by a `Notify`, instead of
//! a channel.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::domain::{SensorRef, Ticket, TrustResult};

/// Per-observer buffer depth. Publication beyond this drops the oldest
/// pending event for that observer, never the newest.
const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ReadingNew,
    TrustUpdated,
    TicketChanged,
    DashboardUpdate,
}

/// Event payload. Only the fields relevant to `kind` are populated; the
/// rest are `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub sequence: u64,
    pub sensor_ref: Option<SensorRef>,
    pub reading_ref: Option<String>,
    pub trust_result: Option<TrustResult>,
    pub ticket: Option<Ticket>,
}

impl Event {
    fn new(kind: EventKind, sequence: u64) -> Self {
        Event { kind, sequence, sensor_ref: None, reading_ref: None, trust_result: None, ticket: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct SubscriberState {
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    closed: AtomicBool,
}

/// The receiving half of a subscription. Polled with [`Receiver::recv`].
pub struct Receiver {
    state: Arc<SubscriberState>,
}

impl Receiver {
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            {
                let mut queue = self.state.queue.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Some(event);
                }
                if self.state.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.state.notify.notified().await;
        }
    }
}

struct Subscriber {
    state: Arc<SubscriberState>,
    /// `None` means "all sensors"; `Some(ref)` filters per-sensor topics to
    /// that sensor. Global-only topics ignore this filter entirely.
    sensor_filter: Option<SensorRef>,
}

/// Fan-out hub. Cloning shares the same underlying subscriber table —
/// Ingestor, TicketManager and the dashboard reader all hold a clone of
/// the one instance constructed at startup.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Mutex<HashMap<u64, Subscriber>>>,
    next_handle: Arc<AtomicU64>,
    sequences: Arc<Mutex<HashMap<EventKind, u64>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Broadcaster {
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_handle: Arc::new(AtomicU64::new(1)),
            sequences: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribes to every topic, unfiltered by sensor.
    pub async fn subscribe(&self) -> (SubscriptionHandle, Receiver) {
        self.add_subscriber(None).await
    }

    /// Subscribes filtered to `sensor_ref`'s own `reading.new`/`trust.updated`
    /// events; global-only topics (`ticket.changed`, `dashboard.update`)
    /// are still delivered, matching §4.E's "per-sensor and global channels".
    pub async fn subscribe_sensor(&self, sensor_ref: SensorRef) -> (SubscriptionHandle, Receiver) {
        self.add_subscriber(Some(sensor_ref)).await
    }

    async fn add_subscriber(&self, sensor_filter: Option<SensorRef>) -> (SubscriptionHandle, Receiver) {
        let state = Arc::new(SubscriberState {
            queue: Mutex::new(VecDeque::with_capacity(SUBSCRIBER_BUFFER)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.inner.lock().await;
        subs.insert(id, Subscriber { state: state.clone(), sensor_filter });
        (SubscriptionHandle(id), Receiver { state })
    }

    /// Always permitted, never blocks publishers. Wakes any pending `recv`
    /// so it observes the closed state and returns `None`.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut subs = self.inner.lock().await;
        if let Some(sub) = subs.remove(&handle.0) {
            sub.state.closed.store(true, Ordering::Release);
            sub.state.notify.notify_waiters();
        }
    }

    async fn next_sequence(&self, kind: EventKind) -> u64 {
        let mut sequences = self.sequences.lock().await;
        let entry = sequences.entry(kind).or_insert(0);
        *entry += 1;
        *entry
    }

    async fn publish(&self, kind: EventKind, sensor_ref: Option<&SensorRef>, mut event: Event) {
        event.sequence = self.next_sequence(kind).await;
        let subs = self.inner.lock().await;
        for sub in subs.values() {
            if let Some(filter) = &sub.sensor_filter {
                let global_topic = matches!(kind, EventKind::TicketChanged | EventKind::DashboardUpdate);
                if !global_topic && sensor_ref != Some(filter) {
                    continue;
                }
            }
            let mut queue = sub.state.queue.lock().await;
            if queue.len() >= SUBSCRIBER_BUFFER {
                queue.pop_front();
                tracing::warn!(event_kind = ?kind, "subscriber buffer full, dropping oldest event");
            }
            queue.push_back(event.clone());
            drop(queue);
            sub.state.notify.notify_one();
        }
    }

    pub async fn publish_reading_new(&self, sensor_ref: &SensorRef, reading_ref: &str) {
        let mut event = Event::new(EventKind::ReadingNew, 0);
        event.sensor_ref = Some(sensor_ref.clone());
        event.reading_ref = Some(reading_ref.to_string());
        self.publish(EventKind::ReadingNew, Some(sensor_ref), event).await;
    }

    pub async fn publish_trust_updated(&self, result: &TrustResult) {
        let mut event = Event::new(EventKind::TrustUpdated, 0);
        event.sensor_ref = Some(result.sensor_ref.clone());
        event.trust_result = Some(result.clone());
        self.publish(EventKind::TrustUpdated, Some(&result.sensor_ref), event).await;
    }

    pub async fn publish_ticket_changed(&self, ticket: &Ticket) {
        let mut event = Event::new(EventKind::TicketChanged, 0);
        event.sensor_ref = Some(ticket.sensor_ref.clone());
        event.ticket = Some(ticket.clone());
        self.publish(EventKind::TicketChanged, None, event).await;
    }

    pub async fn publish_dashboard_update(&self) {
        let event = Event::new(EventKind::DashboardUpdate, 0);
        self.publish(EventKind::DashboardUpdate, None, event).await;
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
