use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::renewal::billing::{BillingService, InvoiceDraft, PaymentDraft};
use crate::workflows::renewal::domain::{
    Actor, Application, ApplicationId, InvoiceId, InvoiceType, Notification, PaymentMethod, Role,
    ServiceType,
};
use crate::workflows::renewal::engine::WorkflowEngine;
use crate::workflows::renewal::memory::{MemoryStore, RecordingDispatcher};
use crate::workflows::renewal::router::{renewal_router, RenewalApi};
use crate::workflows::renewal::status::ApplicationStatus;
use crate::workflows::renewal::store::{CaseStore, NotificationDispatcher, NotifyError};
use crate::workflows::renewal::transitions::allowed_transitions;

pub(super) fn client() -> Actor {
    Actor::new("client-1", Role::Client)
}

pub(super) fn other_client() -> Actor {
    Actor::new("client-2", Role::Client)
}

pub(super) fn processor() -> Actor {
    Actor::new("staff-processing", Role::ProcessingTeam)
}

pub(super) fn finance() -> Actor {
    Actor::new("staff-finance", Role::Finance)
}

pub(super) fn build_engine() -> (
    Arc<WorkflowEngine<MemoryStore, RecordingDispatcher>>,
    Arc<MemoryStore>,
    Arc<RecordingDispatcher>,
) {
    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(RecordingDispatcher::default());
    let engine = Arc::new(WorkflowEngine::new(store.clone(), notifier.clone()));
    (engine, store, notifier)
}

pub(super) fn build_billing() -> (
    Arc<WorkflowEngine<MemoryStore, RecordingDispatcher>>,
    BillingService<MemoryStore, RecordingDispatcher>,
    Arc<MemoryStore>,
    Arc<RecordingDispatcher>,
) {
    let (engine, store, notifier) = build_engine();
    let billing = BillingService::new(engine.clone());
    (engine, billing, store, notifier)
}

pub(super) fn open_case<S, N>(engine: &WorkflowEngine<S, N>, owner: &Actor) -> Application
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    engine
        .open_application(owner, ServiceType::Normal, None)
        .expect("application opens")
}

/// Walk an application to `target` through legal staff transitions. Pipeline
/// targets are reached by stepping forward one status at a time; `on_hold` and
/// `cancelled` are a single sideways move from wherever the case currently is.
pub(super) fn drive_to<S, N>(
    engine: &WorkflowEngine<S, N>,
    id: &ApplicationId,
    target: ApplicationStatus,
    actor: &Actor,
) where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    loop {
        let current = engine
            .store()
            .fetch_application(id)
            .expect("fetch succeeds")
            .expect("application exists")
            .status;
        if current == target {
            return;
        }
        let step = match target {
            ApplicationStatus::OnHold | ApplicationStatus::Cancelled => target,
            // The first listed edge is always the forward one.
            _ => allowed_transitions(current)[0],
        };
        engine
            .transition(id, step, actor, None)
            .expect("legal step while driving");
    }
}

pub(super) fn client_invoice_draft(
    application: &Application,
    amount_cents: i64,
) -> InvoiceDraft {
    InvoiceDraft {
        application_id: application.id.clone(),
        invoice_type: InvoiceType::Client,
        issued_to: application.client_id.clone(),
        description: "Passport renewal service fee".to_string(),
        currency: "USD".to_string(),
        amount_cents,
        line_items: vec![crate::workflows::renewal::domain::InvoiceLineItem {
            description: "Renewal processing".to_string(),
            quantity: 1,
            unit_price_cents: amount_cents,
            total_cents: amount_cents,
        }],
        due_date: None,
    }
}

pub(super) fn agent_invoice_draft(
    application: &Application,
    amount_cents: i64,
) -> InvoiceDraft {
    InvoiceDraft {
        invoice_type: InvoiceType::Agent,
        issued_to: crate::workflows::renewal::domain::ActorId("agent-accra".to_string()),
        description: "Local agent disbursement".to_string(),
        ..client_invoice_draft(application, amount_cents)
    }
}

pub(super) fn payment_draft(invoice_id: &InvoiceId, amount_cents: i64) -> PaymentDraft {
    PaymentDraft {
        invoice_id: invoice_id.clone(),
        amount_cents,
        method: PaymentMethod::BankTransfer,
        transaction_reference: Some("TXN-1234".to_string()),
        proof_file_path: Some("proofs/txn-1234.pdf".to_string()),
    }
}

/// Dispatcher whose transport is permanently down, for asserting that delivery
/// failures surface as warnings rather than errors.
pub(super) struct FailingDispatcher;

impl NotificationDispatcher for FailingDispatcher {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }
}

pub(super) fn build_failing_engine() -> (
    Arc<WorkflowEngine<MemoryStore, FailingDispatcher>>,
    Arc<MemoryStore>,
) {
    let store = Arc::new(MemoryStore::default());
    let engine = Arc::new(WorkflowEngine::new(store.clone(), Arc::new(FailingDispatcher)));
    (engine, store)
}

pub(super) fn build_api() -> (
    axum::Router,
    Arc<RenewalApi<MemoryStore, RecordingDispatcher>>,
    Arc<MemoryStore>,
) {
    let (engine, store, _) = build_engine();
    let api = Arc::new(RenewalApi::new(engine));
    (renewal_router(api.clone()), api, store)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn history_len(store: &MemoryStore, id: &ApplicationId) -> usize {
    store.history_for(id).expect("history fetch").len()
}

pub(super) fn assert_status(store: &MemoryStore, id: &ApplicationId, expected: ApplicationStatus) {
    let status = store
        .fetch_application(id)
        .expect("fetch succeeds")
        .expect("application exists")
        .status;
    assert_eq!(status, expected);
}
