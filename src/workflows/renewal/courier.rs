use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::domain::{
    Actor, ApplicationId, AuditLogEntry, CourierDirection, CourierShipment, CourierStatus,
    ShipmentId,
};
use super::store::{CaseStore, StoreError};

impl CourierStatus {
    /// Shipments move strictly linearly; `Delivered` and `Returned` are the
    /// two terminal ends and no step may be skipped.
    pub const fn can_advance_to(self, target: CourierStatus) -> bool {
        matches!(
            (self, target),
            (CourierStatus::Pending, CourierStatus::Dispatched)
                | (CourierStatus::Dispatched, CourierStatus::InTransit)
                | (CourierStatus::InTransit, CourierStatus::Delivered)
                | (CourierStatus::InTransit, CourierStatus::Returned)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, CourierStatus::Delivered | CourierStatus::Returned)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    #[error("shipment cannot move from {from:?} to {to:?}")]
    InvalidMovement {
        from: CourierStatus,
        to: CourierStatus,
    },
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tracks physical document and passport movement between the processing
/// office, the client, the local agent, and the passport office. Courier state
/// never feeds back into the application status machine.
pub struct CourierService<S> {
    store: Arc<S>,
}

static SHIPMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_shipment_id() -> ShipmentId {
    let seq = SHIPMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ShipmentId(format!("ship-{seq:06}"))
}

impl<S> CourierService<S>
where
    S: CaseStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn open_shipment(
        &self,
        application_id: ApplicationId,
        direction: CourierDirection,
        courier_company: Option<String>,
        tracking_number: Option<String>,
        actor: &Actor,
    ) -> Result<CourierShipment, CourierError> {
        self.store
            .fetch_application(&application_id)?
            .ok_or(CourierError::NotFound {
                resource: "application",
            })?;

        let now = Utc::now();
        let shipment = CourierShipment {
            id: next_shipment_id(),
            application_id,
            direction,
            courier_company,
            tracking_number,
            status: CourierStatus::Pending,
            dispatched_at: None,
            delivered_at: None,
            notes: None,
            created_by: actor.id.clone(),
            created_at: now,
        };

        let shipment = self.store.insert_shipment(shipment)?;
        self.audit(&shipment, actor);
        Ok(shipment)
    }

    /// Advance a shipment one leg, stamping dispatch and delivery times.
    pub fn advance_shipment(
        &self,
        id: &ShipmentId,
        target: CourierStatus,
        actor: &Actor,
    ) -> Result<CourierShipment, CourierError> {
        let mut shipment = self
            .store
            .fetch_shipment(id)?
            .ok_or(CourierError::NotFound {
                resource: "shipment",
            })?;

        if !shipment.status.can_advance_to(target) {
            return Err(CourierError::InvalidMovement {
                from: shipment.status,
                to: target,
            });
        }

        let now = Utc::now();
        shipment.status = target;
        match target {
            CourierStatus::Dispatched => shipment.dispatched_at = Some(now),
            CourierStatus::Delivered | CourierStatus::Returned => {
                shipment.delivered_at = Some(now)
            }
            _ => {}
        }

        self.store.update_shipment(shipment.clone())?;
        self.audit(&shipment, actor);
        Ok(shipment)
    }

    fn audit(&self, shipment: &CourierShipment, actor: &Actor) {
        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "courier.update".to_string(),
            resource_type: "courier_shipment",
            resource_id: shipment.id.0.clone(),
            new_values: Some(json!({
                "direction": shipment.direction,
                "status": shipment.status,
            })),
            created_at: Utc::now(),
        }) {
            tracing::warn!(shipment = %shipment.id.0, %error, "audit append failed on courier update");
        }
    }
}
