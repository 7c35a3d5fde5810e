//! Passport-renewal workflow core: the status registry, the transition table,
//! the engine executing transitions with their side effects, and the billing
//! and courier services hanging off it.
//!
//! Everything here is request-scoped; the [`store::CaseStore`] trait is the
//! only shared mutable resource and the sole seam the engine mutates through.

pub mod billing;
pub mod courier;
pub mod domain;
pub(crate) mod effects;
pub mod engine;
pub mod history;
pub mod memory;
pub mod router;
pub mod status;
pub mod store;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use billing::{
    BillingError, BillingService, ConfirmPaymentOutcome, InvoiceDraft, PaymentDraft,
    RejectPaymentOutcome, SendInvoiceOutcome, SubmitPaymentOutcome,
};
pub use courier::{CourierError, CourierService};
pub use domain::{
    Actor, ActorId, Application, ApplicationId, AuditLogEntry, CourierDirection, CourierShipment,
    CourierStatus, Invoice, InvoiceId, InvoiceLineItem, InvoiceStatus, InvoiceType, Notification,
    NotificationChannel, NotificationType, Payment, PaymentId, PaymentMethod, PaymentStatus, Role,
    ServiceType, ShipmentId, StatusHistoryEntry,
};
pub use effects::SideEffectWarning;
pub use engine::{
    KycOutcome, TransitionOutcome, WorkflowEngine, WorkflowError, CLIENT_CANCELLABLE,
};
pub use history::{replay_is_legal, timeline, TimelineEntryView};
pub use memory::{MemoryStore, RecordingDispatcher};
pub use router::{renewal_router, RenewalApi};
pub use status::{ApplicationStatus, KycStatus, WorkflowStep, WORKFLOW_STEPS};
pub use store::{CaseStore, NotificationDispatcher, NotifyError, StoreError};
pub use transitions::{allowed_transitions, is_legal_transition};
