use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::billing::{BillingError, BillingService, InvoiceDraft, PaymentDraft};
use super::domain::{
    Actor, ActorId, ApplicationId, InvoiceId, InvoiceLineItem, InvoiceType, PaymentId,
    PaymentMethod, Role, ServiceType,
};
use super::engine::{TransitionOutcome, WorkflowEngine, WorkflowError};
use super::history;
use super::status::{ApplicationStatus, KycStatus};
use super::store::{CaseStore, NotificationDispatcher, StoreError};

/// Service bundle handed to the HTTP layer.
pub struct RenewalApi<S, N> {
    pub engine: Arc<WorkflowEngine<S, N>>,
    pub billing: Arc<BillingService<S, N>>,
}

impl<S, N> RenewalApi<S, N>
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(engine: Arc<WorkflowEngine<S, N>>) -> Self {
        let billing = Arc::new(BillingService::new(engine.clone()));
        Self { engine, billing }
    }
}

/// Router builder exposing the workflow core over HTTP. Identity arrives in
/// the request payload as an opaque actor; authentication is upstream.
pub fn renewal_router<S, N>(api: Arc<RenewalApi<S, N>>) -> Router
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/api/v1/renewals", post(open_handler::<S, N>))
        .route("/api/v1/renewals/:id", get(status_handler::<S, N>))
        .route(
            "/api/v1/renewals/:id/history",
            get(history_handler::<S, N>),
        )
        .route(
            "/api/v1/renewals/:id/transition",
            post(transition_handler::<S, N>),
        )
        .route("/api/v1/renewals/:id/kyc", post(kyc_handler::<S, N>))
        .route("/api/v1/renewals/:id/cancel", post(cancel_handler::<S, N>))
        .route("/api/v1/invoices", post(create_invoice_handler::<S, N>))
        .route(
            "/api/v1/invoices/:id/send",
            post(send_invoice_handler::<S, N>),
        )
        .route("/api/v1/payments", post(submit_payment_handler::<S, N>))
        .route(
            "/api/v1/payments/:id/confirm",
            post(confirm_payment_handler::<S, N>),
        )
        .route(
            "/api/v1/payments/:id/reject",
            post(reject_payment_handler::<S, N>),
        )
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub struct ActorPayload {
    pub actor_id: String,
    pub role: Role,
}

impl ActorPayload {
    fn actor(&self) -> Actor {
        Actor {
            id: ActorId(self.actor_id.clone()),
            role: self.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    #[serde(flatten)]
    pub actor: ActorPayload,
    pub service_type: ServiceType,
    pub form_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    #[serde(flatten)]
    pub actor: ActorPayload,
    pub target: ApplicationStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KycRequest {
    #[serde(flatten)]
    pub actor: ActorPayload,
    pub kyc_status: KycStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(flatten)]
    pub actor: ActorPayload,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    #[serde(flatten)]
    pub actor: ActorPayload,
    pub application_id: String,
    pub invoice_type: InvoiceType,
    pub issued_to: String,
    pub description: String,
    pub currency: String,
    pub amount_cents: i64,
    pub line_items: Vec<InvoiceLineItem>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPaymentRequest {
    #[serde(flatten)]
    pub actor: ActorPayload,
    pub invoice_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub transaction_reference: Option<String>,
    pub proof_file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectPaymentRequest {
    #[serde(flatten)]
    pub actor: ActorPayload,
    pub reason: String,
}

fn transition_body(outcome: &TransitionOutcome) -> serde_json::Value {
    json!({
        "application_id": outcome.application.id.0,
        "from": outcome.from,
        "status": outcome.to,
        "warnings": outcome.warnings,
    })
}

/// Primary errors map to rejections; a committed transition with failed side
/// effects never comes through here, it stays a 200 with warnings.
fn workflow_error_response(error: &WorkflowError) -> Response {
    let status = match error {
        WorkflowError::InvalidTransition { .. } | WorkflowError::NotCancellable { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::Unauthorized => StatusCode::FORBIDDEN,
        WorkflowError::Store(StoreError::Conflict | StoreError::RevisionMismatch) => {
            StatusCode::CONFLICT
        }
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

fn billing_error_response(error: &BillingError) -> Response {
    match error {
        BillingError::Workflow(inner) => workflow_error_response(inner),
        BillingError::AmountMismatch { .. }
        | BillingError::EmptyLineItems
        | BillingError::NotSendable { .. }
        | BillingError::NotConfirmable { .. } => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        BillingError::NotFound { .. } => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        BillingError::Store(StoreError::Conflict | StoreError::RevisionMismatch) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        BillingError::Store(_) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

async fn open_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    axum::Json(request): axum::Json<OpenRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    match api
        .engine
        .open_application(&actor, request.service_type, request.form_data)
    {
        Ok(application) => {
            let payload = json!({
                "application_id": application.id.0,
                "reference_number": application.reference_number,
                "status": application.status,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => workflow_error_response(&error),
    }
}

async fn status_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let id = ApplicationId(id);
    match api.engine.store().fetch_application(&id) {
        Ok(Some(application)) => {
            let payload = json!({
                "application_id": application.id.0,
                "reference_number": application.reference_number,
                "status": application.status,
                "status_label": application.status.label(),
                "kyc_status": application.kyc_status,
                "pipeline_index": application.status.pipeline_index(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(None) => {
            let payload = json!({ "error": "application not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

async fn history_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let id = ApplicationId(id);
    match api.engine.store().history_for(&id) {
        Ok(entries) => {
            let payload = json!({ "entries": history::timeline(&entries) });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

async fn transition_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    match api.engine.transition(
        &ApplicationId(id),
        request.target,
        &actor,
        request.reason,
    ) {
        Ok(outcome) => (StatusCode::OK, axum::Json(transition_body(&outcome))).into_response(),
        Err(error) => workflow_error_response(&error),
    }
}

async fn kyc_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<KycRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    match api.engine.apply_kyc_result(
        &ApplicationId(id),
        request.kyc_status,
        request.notes,
        &actor,
    ) {
        Ok(outcome) => {
            let payload = json!({
                "application_id": outcome.application.id.0,
                "kyc_status": outcome.application.kyc_status,
                "status": outcome.application.status,
                "advanced": outcome.transition.is_some(),
                "warnings": outcome
                    .transition
                    .as_ref()
                    .map(|transition| transition.warnings.clone())
                    .unwrap_or_default(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => workflow_error_response(&error),
    }
}

async fn cancel_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<CancelRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    match api.engine.client_cancel(&ApplicationId(id), &actor) {
        Ok(outcome) => (StatusCode::OK, axum::Json(transition_body(&outcome))).into_response(),
        Err(error) => workflow_error_response(&error),
    }
}

async fn create_invoice_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    axum::Json(request): axum::Json<CreateInvoiceRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    let draft = InvoiceDraft {
        application_id: ApplicationId(request.application_id),
        invoice_type: request.invoice_type,
        issued_to: ActorId(request.issued_to),
        description: request.description,
        currency: request.currency,
        amount_cents: request.amount_cents,
        line_items: request.line_items,
        due_date: request.due_date,
    };
    match api.billing.create_invoice(draft, &actor) {
        Ok(invoice) => {
            let payload = json!({
                "invoice_id": invoice.id.0,
                "invoice_number": invoice.invoice_number,
                "status": invoice.status,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => billing_error_response(&error),
    }
}

async fn send_invoice_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<CancelRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    match api.billing.send_invoice(&InvoiceId(id), &actor) {
        Ok(outcome) => {
            let payload = json!({
                "invoice_id": outcome.invoice.id.0,
                "status": outcome.invoice.status,
                "application_status": outcome
                    .transition
                    .as_ref()
                    .map(|transition| transition.to),
                "warnings": outcome.warnings,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => billing_error_response(&error),
    }
}

async fn submit_payment_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    axum::Json(request): axum::Json<SubmitPaymentRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    let draft = PaymentDraft {
        invoice_id: InvoiceId(request.invoice_id),
        amount_cents: request.amount_cents,
        method: request.method,
        transaction_reference: request.transaction_reference,
        proof_file_path: request.proof_file_path,
    };
    match api.billing.submit_payment(draft, &actor) {
        Ok(outcome) => {
            let payload = json!({
                "payment_id": outcome.payment.id.0,
                "status": outcome.payment.status,
                "warnings": outcome.warnings,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => billing_error_response(&error),
    }
}

async fn confirm_payment_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<CancelRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    match api.billing.confirm_payment(&PaymentId(id), &actor) {
        Ok(outcome) => {
            let payload = json!({
                "payment_id": outcome.payment.id.0,
                "payment_status": outcome.payment.status,
                "invoice_status": outcome.invoice.status,
                "application_status": outcome.transition.to,
                "warnings": outcome.warnings,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => billing_error_response(&error),
    }
}

async fn reject_payment_handler<S, N>(
    State(api): State<Arc<RenewalApi<S, N>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<RejectPaymentRequest>,
) -> Response
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = request.actor.actor();
    match api
        .billing
        .reject_payment(&PaymentId(id), request.reason, &actor)
    {
        Ok(outcome) => {
            let payload = json!({
                "payment_id": outcome.payment.id.0,
                "payment_status": outcome.payment.status,
                "warnings": outcome.warnings,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => billing_error_response(&error),
    }
}
