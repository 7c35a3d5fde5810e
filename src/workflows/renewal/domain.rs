use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::{ApplicationStatus, KycStatus};

/// Identifier wrapper for renewal applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipmentId(pub String);

/// Opaque identity of whoever is acting. The core records it and checks
/// ownership; authentication happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    ProcessingTeam,
    Finance,
    LocalAgent,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::ProcessingTeam => "Processing Team",
            Self::Finance => "Finance",
            Self::LocalAgent => "Local Agent",
            Self::Admin => "Admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: ActorId(id.into()),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Normal,
    Expedited,
}

/// The central entity: one client's renewal case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub reference_number: String,
    pub client_id: ActorId,
    pub service_type: ServiceType,
    pub status: ApplicationStatus,
    pub kyc_status: KycStatus,
    pub kyc_notes: Option<String>,
    pub kyc_completed_by: Option<ActorId>,
    pub kyc_completed_at: Option<DateTime<Utc>>,
    /// Structured passport form payload, mutable until submission.
    pub form_data: Option<Value>,
    pub form_completed_at: Option<DateTime<Utc>>,
    pub government_submission_date: Option<DateTime<Utc>>,
    pub expected_completion_date: Option<DateTime<Utc>>,
    pub passport_office_reference: Option<String>,
    pub new_passport_number: Option<String>,
    pub passport_issued_date: Option<DateTime<Utc>>,
    pub client_acknowledged: bool,
    pub acknowledgment_signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token; the store rejects updates whose revision
    /// does not match the stored row.
    pub revision: u64,
}

/// Immutable record of one status transition. `from` is `None` only for the
/// opening entry written when the application is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub application_id: ApplicationId,
    pub from: Option<ApplicationStatus>,
    pub to: ApplicationStatus,
    pub changed_by: ActorId,
    pub reason: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Client,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub application_id: ApplicationId,
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub issued_to: ActorId,
    pub issued_by: ActorId,
    /// Must equal the sum of line-item totals at creation time.
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub line_items: Vec<InvoiceLineItem>,
    pub status: InvoiceStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Submitted,
    Confirmed,
    Rejected,
}

/// One client-submitted proof-of-payment event against exactly one invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub application_id: ApplicationId,
    pub amount_cents: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub proof_file_path: Option<String>,
    pub transaction_reference: Option<String>,
    pub submitted_by: ActorId,
    pub confirmed_by: Option<ActorId>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Directed legs documents and passports travel along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourierDirection {
    ClientToProcessing,
    ProcessingToAgent,
    AgentToPassportOffice,
    PassportOfficeToAgent,
    AgentToProcessing,
    ProcessingToClient,
}

impl CourierDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ClientToProcessing => "Client to Processing",
            Self::ProcessingToAgent => "Processing to Agent",
            Self::AgentToPassportOffice => "Agent to Passport Office",
            Self::PassportOfficeToAgent => "Passport Office to Agent",
            Self::AgentToProcessing => "Agent to Processing",
            Self::ProcessingToClient => "Processing to Client",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    Pending,
    Dispatched,
    InTransit,
    Delivered,
    Returned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierShipment {
    pub id: ShipmentId,
    pub application_id: ApplicationId,
    pub direction: CourierDirection,
    pub courier_company: Option<String>,
    pub tracking_number: Option<String>,
    pub status: CourierStatus,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

/// Tag used for UI rendering and email template selection only; no routing
/// logic keys off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StatusChange,
    DocumentRequest,
    PaymentRequest,
    PaymentConfirmed,
    PaymentRejected,
    PassportReady,
    Reminder,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Both,
}

/// Recipient-addressed message produced as a workflow side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: ActorId,
    pub application_id: Option<ApplicationId>,
    pub kind: NotificationType,
    pub title: String,
    pub body: String,
    pub action_url: Option<String>,
    pub channel: NotificationChannel,
}

/// Broad-granularity action journal, separate from the status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub actor_id: ActorId,
    pub action: String,
    pub resource_type: &'static str,
    pub resource_id: String,
    pub new_values: Option<Value>,
    pub created_at: DateTime<Utc>,
}
