use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::domain::{
    Actor, ActorId, Application, ApplicationId, AuditLogEntry, CourierShipment, Invoice, InvoiceId,
    Notification, Payment, PaymentId, Role, ShipmentId, StatusHistoryEntry,
};
use super::store::{CaseStore, NotificationDispatcher, NotifyError, StoreError};

/// In-memory `CaseStore` backing the demo subcommand and the test suite.
/// Mutex-per-table; the journals are plain append vectors in insertion order.
/// A poisoned table surfaces as `StoreError::Unavailable` rather than a panic.
#[derive(Default)]
pub struct MemoryStore {
    applications: Mutex<HashMap<ApplicationId, Application>>,
    invoices: Mutex<HashMap<InvoiceId, Invoice>>,
    payments: Mutex<HashMap<PaymentId, Payment>>,
    shipments: Mutex<HashMap<ShipmentId, CourierShipment>>,
    history: Mutex<Vec<StatusHistoryEntry>>,
    audit: Mutex<Vec<AuditLogEntry>>,
    staff: Mutex<Vec<(ActorId, Role)>>,
}

fn table<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable(format!("{name} table poisoned")))
}

impl MemoryStore {
    pub fn register_staff(&self, actor: &Actor) {
        self.staff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((actor.id.clone(), actor.role));
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CaseStore for MemoryStore {
    fn insert_application(&self, application: Application) -> Result<Application, StoreError> {
        let mut guard = table(&self.applications, "application")?;
        if guard.contains_key(&application.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        let guard = table(&self.applications, "application")?;
        Ok(guard.get(id).cloned())
    }

    fn update_application(&self, mut application: Application) -> Result<Application, StoreError> {
        let mut guard = table(&self.applications, "application")?;
        let stored = guard.get(&application.id).ok_or(StoreError::NotFound)?;
        if stored.revision != application.revision {
            return Err(StoreError::RevisionMismatch);
        }
        application.revision += 1;
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        let mut guard = table(&self.invoices, "invoice")?;
        if guard.contains_key(&invoice.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice)
    }

    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let guard = table(&self.invoices, "invoice")?;
        Ok(guard.get(id).cloned())
    }

    fn update_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        let mut guard = table(&self.invoices, "invoice")?;
        if !guard.contains_key(&invoice.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(invoice.id.clone(), invoice);
        Ok(())
    }

    fn insert_payment(&self, payment: Payment) -> Result<Payment, StoreError> {
        let mut guard = table(&self.payments, "payment")?;
        if guard.contains_key(&payment.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, StoreError> {
        let guard = table(&self.payments, "payment")?;
        Ok(guard.get(id).cloned())
    }

    fn update_payment(&self, payment: Payment) -> Result<(), StoreError> {
        let mut guard = table(&self.payments, "payment")?;
        if !guard.contains_key(&payment.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(payment.id.clone(), payment);
        Ok(())
    }

    fn insert_shipment(&self, shipment: CourierShipment) -> Result<CourierShipment, StoreError> {
        let mut guard = table(&self.shipments, "shipment")?;
        if guard.contains_key(&shipment.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(shipment.id.clone(), shipment.clone());
        Ok(shipment)
    }

    fn fetch_shipment(&self, id: &ShipmentId) -> Result<Option<CourierShipment>, StoreError> {
        let guard = table(&self.shipments, "shipment")?;
        Ok(guard.get(id).cloned())
    }

    fn update_shipment(&self, shipment: CourierShipment) -> Result<(), StoreError> {
        let mut guard = table(&self.shipments, "shipment")?;
        if !guard.contains_key(&shipment.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(shipment.id.clone(), shipment);
        Ok(())
    }

    fn append_history(&self, entry: StatusHistoryEntry) -> Result<(), StoreError> {
        table(&self.history, "history")?.push(entry);
        Ok(())
    }

    fn history_for(&self, id: &ApplicationId) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let guard = table(&self.history, "history")?;
        Ok(guard
            .iter()
            .filter(|entry| entry.application_id == *id)
            .cloned()
            .collect())
    }

    fn append_audit(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        table(&self.audit, "audit")?.push(entry);
        Ok(())
    }

    fn staff_with_roles(&self, roles: &[Role]) -> Result<Vec<ActorId>, StoreError> {
        let guard = table(&self.staff, "staff")?;
        Ok(guard
            .iter()
            .filter(|(_, role)| roles.contains(role))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

/// Dispatcher that records every notification so callers can assert on
/// delivery.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError::Transport("notification log poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
