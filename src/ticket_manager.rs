//! The Ticket Manager (§4.D): opens, updates and resolves maintenance
//! tickets with at most one `Open` ticket per sensor, and emits
//! `ticket.changed` for every transition.

use crate::broadcaster::Broadcaster;
use crate::domain::{Severity, SensorRef, Ticket, TicketRef, TicketStatus};
use crate::error::StoreError;
use crate::id_generator::IdGenerator;
use crate::store::Store;
use crate::time::Clock;

/// Errors the Ticket Manager can surface. Distinct from [`crate::error::CoreError`]
/// since ticket transitions are not one of the five kinds §7 enumerates for
/// the ingest path; `on_anomalous` failures, per §7, are logged by the
/// caller and do not fail the ingest that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket {0} is already resolved and cannot transition further")]
    AlreadyResolved(String),
    #[error("ticket {0} cannot transition back to open")]
    InvalidTransition(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct TicketManager<'a> {
    store: &'a dyn Store,
    broadcaster: &'a Broadcaster,
    id_generator: &'a dyn IdGenerator,
    clock: &'a dyn Clock,
}

impl<'a> TicketManager<'a> {
    pub fn new(
        store: &'a dyn Store,
        broadcaster: &'a Broadcaster,
        id_generator: &'a dyn IdGenerator,
        clock: &'a dyn Clock,
    ) -> Self {
        TicketManager { store, broadcaster, id_generator, clock }
    }

    /// Opens a new ticket for `sensor_ref`, or — if one is already Open —
    /// updates its issue text and raises its severity to the max of the two
    /// (never lowers it, per §9's resolved open question). Caller is
    /// expected to hold the sensor's serialisation lock (§5).
    pub async fn on_anomalous(
        &self,
        sensor_ref: &SensorRef,
        diagnostic: &str,
        severity: Severity,
    ) -> Result<Ticket, TicketError> {
        let ticket = match self.store.open_ticket_for_sensor(sensor_ref).await {
            Some(mut existing) => {
                existing.issue = diagnostic.to_string();
                existing.severity = existing.severity.max(severity);
                existing
            }
            None => Ticket {
                ticket_ref: self.id_generator.uuid_v4(),
                sensor_ref: sensor_ref.clone(),
                issue: diagnostic.to_string(),
                severity,
                status: TicketStatus::Open,
                created_at: self.clock.now_rfc3339(),
                resolved_at: None,
            },
        };

        self.store.save_ticket(ticket.clone()).await?;
        self.broadcaster.publish_ticket_changed(&ticket).await;
        Ok(ticket)
    }

    pub async fn resolve(&self, ticket_ref: &TicketRef) -> Result<Ticket, TicketError> {
        self.transition(ticket_ref, TicketStatus::Resolved).await
    }

    pub async fn progress(&self, ticket_ref: &TicketRef) -> Result<Ticket, TicketError> {
        self.transition(ticket_ref, TicketStatus::InProgress).await
    }

    /// General entry point for `UpdateTicket` (§6): dispatches to
    /// `progress`/`resolve` for the two reachable target states and rejects
    /// `Open`, which is only ever entered by `on_anomalous`.
    pub async fn update_status(&self, ticket_ref: &TicketRef, target: TicketStatus) -> Result<Ticket, TicketError> {
        match target {
            TicketStatus::Open => Err(TicketError::InvalidTransition(ticket_ref.clone())),
            TicketStatus::InProgress => self.progress(ticket_ref).await,
            TicketStatus::Resolved => self.resolve(ticket_ref).await,
        }
    }

    /// `Open -> InProgress -> Resolved`; `Open -> Resolved` directly is also
    /// permitted. No transition out of `Resolved` is allowed.
    async fn transition(&self, ticket_ref: &TicketRef, new_status: TicketStatus) -> Result<Ticket, TicketError> {
        let mut ticket = self.store.get_ticket(ticket_ref).await?;
        if ticket.status == TicketStatus::Resolved {
            return Err(TicketError::AlreadyResolved(ticket_ref.clone()));
        }
        ticket.status = new_status;
        if new_status == TicketStatus::Resolved {
            ticket.resolved_at = Some(self.clock.now_rfc3339());
        }
        self.store.save_ticket(ticket.clone()).await?;
        self.broadcaster.publish_ticket_changed(&ticket).await;
        Ok(ticket)
    }

    pub async fn list(&self, status_filter: Option<TicketStatus>) -> Vec<Ticket> {
        self.store.list_tickets(status_filter).await
    }

    /// `(open, in_progress, resolved, total)`.
    pub async fn stats_summary(&self) -> (usize, usize, usize, usize) {
        let all = self.store.list_tickets(None).await;
        let open = all.iter().filter(|t| t.status == TicketStatus::Open).count();
        let in_progress = all.iter().filter(|t| t.status == TicketStatus::InProgress).count();
        let resolved = all.iter().filter(|t| t.status == TicketStatus::Resolved).count();
        (open, in_progress, resolved, all.len())
    }
}
