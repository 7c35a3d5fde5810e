use super::domain::{
    ActorId, Application, ApplicationId, AuditLogEntry, CourierShipment, Invoice, InvoiceId,
    Notification, Payment, PaymentId, Role, ShipmentId, StatusHistoryEntry,
};

/// Persistence seam for every entity the workflow core touches, so the engine
/// and services can be exercised against an in-memory double.
pub trait CaseStore: Send + Sync {
    fn insert_application(&self, application: Application) -> Result<Application, StoreError>;
    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError>;
    /// Revision-checked write: fails with `RevisionMismatch` when the stored
    /// row has moved past the revision carried by `application`, and bumps the
    /// revision on success. This is what makes the read-validate-write gap
    /// detectable under concurrent writers.
    fn update_application(&self, application: Application) -> Result<Application, StoreError>;

    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError>;
    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, StoreError>;
    fn update_invoice(&self, invoice: Invoice) -> Result<(), StoreError>;

    fn insert_payment(&self, payment: Payment) -> Result<Payment, StoreError>;
    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, StoreError>;
    fn update_payment(&self, payment: Payment) -> Result<(), StoreError>;

    fn insert_shipment(&self, shipment: CourierShipment) -> Result<CourierShipment, StoreError>;
    fn fetch_shipment(&self, id: &ShipmentId) -> Result<Option<CourierShipment>, StoreError>;
    fn update_shipment(&self, shipment: CourierShipment) -> Result<(), StoreError>;

    /// Append-only status journal, returned in creation order.
    fn append_history(&self, entry: StatusHistoryEntry) -> Result<(), StoreError>;
    fn history_for(&self, id: &ApplicationId) -> Result<Vec<StatusHistoryEntry>, StoreError>;

    /// Append-only action journal, broader granularity than status history.
    fn append_audit(&self, entry: AuditLogEntry) -> Result<(), StoreError>;

    /// Staff identities holding any of the given roles, for notification
    /// fan-out (e.g. alerting finance on a payment submission).
    fn staff_with_roles(&self, roles: &[Role]) -> Result<Vec<ActorId>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale revision: record was modified by a concurrent writer")]
    RevisionMismatch,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook. Delivery is asynchronous and outside the
/// transition's transaction boundary; implementations must not block on it.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
