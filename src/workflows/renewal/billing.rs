use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde_json::json;

use super::domain::{
    Actor, ActorId, ApplicationId, AuditLogEntry, Invoice, InvoiceId, InvoiceLineItem,
    InvoiceStatus, InvoiceType, Notification, NotificationChannel, NotificationType, Payment,
    PaymentId, PaymentMethod, PaymentStatus, Role,
};
use super::effects::SideEffectWarning;
use super::engine::{TransitionOutcome, WorkflowEngine, WorkflowError};
use super::status::ApplicationStatus;
use super::store::{CaseStore, NotificationDispatcher, StoreError};

/// Invoice and payment operations, including the cross-entity side effects a
/// payment confirmation triggers on the owning application. All application
/// status writes route through the workflow engine so the transition table is
/// enforced here too.
pub struct BillingService<S, N> {
    engine: Arc<WorkflowEngine<S, N>>,
    store: Arc<S>,
    notifier: Arc<N>,
}

static INVOICE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_invoice_id() -> (InvoiceId, String) {
    let seq = INVOICE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let number = format!("INV-{}-{seq:04}", Utc::now().year());
    (InvoiceId(format!("inv-{seq:06}")), number)
}

fn next_payment_id() -> PaymentId {
    let seq = PAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PaymentId(format!("pay-{seq:06}"))
}

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("invoice amount {amount_cents} does not match line item total {line_total_cents}")]
    AmountMismatch {
        amount_cents: i64,
        line_total_cents: i64,
    },
    #[error("invoice requires at least one line item")]
    EmptyLineItems,
    #[error("invoice in status {status:?} can no longer be sent")]
    NotSendable { status: InvoiceStatus },
    #[error("payment in status {status:?} cannot be confirmed")]
    NotConfirmable { status: PaymentStatus },
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub application_id: ApplicationId,
    pub invoice_type: InvoiceType,
    pub issued_to: ActorId,
    pub description: String,
    pub currency: String,
    pub amount_cents: i64,
    pub line_items: Vec<InvoiceLineItem>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PaymentDraft {
    pub invoice_id: InvoiceId,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub transaction_reference: Option<String>,
    pub proof_file_path: Option<String>,
}

#[derive(Debug)]
pub struct SendInvoiceOutcome {
    pub invoice: Invoice,
    /// Present for client invoices, whose send advances the application to
    /// `payment_pending`.
    pub transition: Option<TransitionOutcome>,
    pub warnings: Vec<SideEffectWarning>,
}

#[derive(Debug)]
pub struct SubmitPaymentOutcome {
    pub payment: Payment,
    pub warnings: Vec<SideEffectWarning>,
}

#[derive(Debug)]
pub struct ConfirmPaymentOutcome {
    pub payment: Payment,
    pub invoice: Invoice,
    pub transition: TransitionOutcome,
    pub warnings: Vec<SideEffectWarning>,
}

#[derive(Debug)]
pub struct RejectPaymentOutcome {
    pub payment: Payment,
    pub warnings: Vec<SideEffectWarning>,
}

impl<S, N> BillingService<S, N>
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(engine: Arc<WorkflowEngine<S, N>>) -> Self {
        let store = engine.store().clone();
        let notifier = engine.notifier().clone();
        Self {
            engine,
            store,
            notifier,
        }
    }

    /// Create a draft invoice. The amount must equal the sum of line-item
    /// totals; nothing downstream re-derives it.
    pub fn create_invoice(
        &self,
        draft: InvoiceDraft,
        actor: &Actor,
    ) -> Result<Invoice, BillingError> {
        if draft.line_items.is_empty() {
            return Err(BillingError::EmptyLineItems);
        }
        let line_total_cents: i64 = draft.line_items.iter().map(|item| item.total_cents).sum();
        if line_total_cents != draft.amount_cents {
            return Err(BillingError::AmountMismatch {
                amount_cents: draft.amount_cents,
                line_total_cents,
            });
        }

        self.store
            .fetch_application(&draft.application_id)?
            .ok_or(BillingError::NotFound {
                resource: "application",
            })?;

        let (id, invoice_number) = next_invoice_id();
        let now = Utc::now();
        let invoice = Invoice {
            id: id.clone(),
            application_id: draft.application_id,
            invoice_number,
            invoice_type: draft.invoice_type,
            issued_to: draft.issued_to,
            issued_by: actor.id.clone(),
            amount_cents: draft.amount_cents,
            currency: draft.currency,
            description: draft.description,
            line_items: draft.line_items,
            status: InvoiceStatus::Draft,
            due_date: draft.due_date,
            sent_at: None,
            paid_at: None,
            created_at: now,
        };

        let invoice = self.store.insert_invoice(invoice)?;

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "invoice.create".to_string(),
            resource_type: "invoice",
            resource_id: id.0.clone(),
            new_values: Some(json!({
                "invoice_number": invoice.invoice_number,
                "invoice_type": invoice.invoice_type,
                "amount_cents": invoice.amount_cents,
            })),
            created_at: now,
        }) {
            tracing::warn!(invoice = %id.0, %error, "audit append failed on invoice create");
        }

        Ok(invoice)
    }

    /// Send an invoice: for client invoices the application transition to
    /// `payment_pending` is validated and committed first, so an illegal state
    /// rejects the whole operation before anything is stamped.
    pub fn send_invoice(
        &self,
        id: &InvoiceId,
        actor: &Actor,
    ) -> Result<SendInvoiceOutcome, BillingError> {
        let mut invoice = self
            .store
            .fetch_invoice(id)?
            .ok_or(BillingError::NotFound { resource: "invoice" })?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(BillingError::NotSendable {
                status: invoice.status,
            });
        }
        let application = self
            .store
            .fetch_application(&invoice.application_id)?
            .ok_or(BillingError::NotFound {
                resource: "application",
            })?;

        let transition = match invoice.invoice_type {
            InvoiceType::Client => Some(self.engine.transition(
                &invoice.application_id,
                ApplicationStatus::PaymentPending,
                actor,
                Some(format!("Invoice {} sent", invoice.invoice_number)),
            )?),
            InvoiceType::Agent => None,
        };

        let now = Utc::now();
        invoice.status = InvoiceStatus::Sent;
        invoice.sent_at = Some(now);
        self.store.update_invoice(invoice.clone())?;

        let mut warnings = transition
            .as_ref()
            .map(|outcome| outcome.warnings.clone())
            .unwrap_or_default();

        let amount = invoice.amount_cents as f64 / 100.0;
        if let Err(error) = self.notifier.notify(Notification {
            recipient_id: invoice.issued_to.clone(),
            application_id: Some(invoice.application_id.clone()),
            kind: NotificationType::PaymentRequest,
            title: "Invoice Ready".to_string(),
            body: format!(
                "An invoice ({}) of {} {amount:.2} has been issued for application {}.",
                invoice.invoice_number, invoice.currency, application.reference_number,
            ),
            action_url: Some("/payments".to_string()),
            channel: NotificationChannel::Both,
        }) {
            warnings.push(SideEffectWarning {
                effect: "notify_recipient:Invoice Ready".to_string(),
                error: error.to_string(),
            });
        }

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "invoice.send".to_string(),
            resource_type: "invoice",
            resource_id: id.0.clone(),
            new_values: Some(json!({ "status": InvoiceStatus::Sent })),
            created_at: now,
        }) {
            warnings.push(SideEffectWarning {
                effect: "audit:invoice.send".to_string(),
                error: error.to_string(),
            });
        }

        Ok(SendInvoiceOutcome {
            invoice,
            transition,
            warnings,
        })
    }

    /// Record a client-submitted proof of payment and alert finance. The
    /// application status is untouched until a staff confirmation.
    pub fn submit_payment(
        &self,
        draft: PaymentDraft,
        actor: &Actor,
    ) -> Result<SubmitPaymentOutcome, BillingError> {
        let invoice = self
            .store
            .fetch_invoice(&draft.invoice_id)?
            .ok_or(BillingError::NotFound { resource: "invoice" })?;

        let now = Utc::now();
        let payment = Payment {
            id: next_payment_id(),
            invoice_id: invoice.id.clone(),
            application_id: invoice.application_id.clone(),
            amount_cents: draft.amount_cents,
            currency: invoice.currency.clone(),
            method: draft.method,
            status: PaymentStatus::Submitted,
            proof_file_path: draft.proof_file_path,
            transaction_reference: draft.transaction_reference,
            submitted_by: actor.id.clone(),
            confirmed_by: None,
            confirmed_at: None,
            notes: None,
            created_at: now,
        };

        let payment = self.store.insert_payment(payment)?;
        let mut warnings = Vec::new();

        // Fan-out to finance must never fail the submission itself.
        match self.store.staff_with_roles(&[Role::Finance, Role::Admin]) {
            Ok(recipients) => {
                for recipient in recipients {
                    if let Err(error) = self.notifier.notify(Notification {
                        recipient_id: recipient.clone(),
                        application_id: Some(invoice.application_id.clone()),
                        kind: NotificationType::General,
                        title: "Payment Proof Submitted".to_string(),
                        body: format!(
                            "A client has submitted proof of payment for invoice {}. Review and confirm.",
                            invoice.invoice_number,
                        ),
                        action_url: Some(format!("/admin/requests/{}", invoice.application_id.0)),
                        channel: NotificationChannel::InApp,
                    }) {
                        warnings.push(SideEffectWarning {
                            effect: format!("notify_staff:{}", recipient.0),
                            error: error.to_string(),
                        });
                    }
                }
            }
            Err(error) => warnings.push(SideEffectWarning {
                effect: "lookup_finance_recipients".to_string(),
                error: error.to_string(),
            }),
        }

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "payment.submit".to_string(),
            resource_type: "payment",
            resource_id: payment.id.0.clone(),
            new_values: Some(json!({
                "invoice_id": payment.invoice_id,
                "amount_cents": payment.amount_cents,
            })),
            created_at: now,
        }) {
            warnings.push(SideEffectWarning {
                effect: "audit:payment.submit".to_string(),
                error: error.to_string(),
            });
        }

        Ok(SubmitPaymentOutcome { payment, warnings })
    }

    /// Confirm a payment. The single event that marks the invoice paid,
    /// advances the owning application (client invoices to
    /// `payment_confirmed`, agent invoices to `document_collection`), and for
    /// client invoices notifies whoever submitted the proof. The transition is
    /// validated first so an out-of-order confirmation rejects cleanly before
    /// any write.
    pub fn confirm_payment(
        &self,
        id: &PaymentId,
        actor: &Actor,
    ) -> Result<ConfirmPaymentOutcome, BillingError> {
        let mut payment = self
            .store
            .fetch_payment(id)?
            .ok_or(BillingError::NotFound { resource: "payment" })?;
        if payment.status != PaymentStatus::Submitted {
            return Err(BillingError::NotConfirmable {
                status: payment.status,
            });
        }
        let mut invoice = self
            .store
            .fetch_invoice(&payment.invoice_id)?
            .ok_or(BillingError::NotFound { resource: "invoice" })?;

        let target = match invoice.invoice_type {
            InvoiceType::Client => ApplicationStatus::PaymentConfirmed,
            InvoiceType::Agent => ApplicationStatus::DocumentCollection,
        };

        let transition = self.engine.transition(
            &payment.application_id,
            target,
            actor,
            Some(format!("Payment confirmed for invoice {}", invoice.invoice_number)),
        )?;

        let now = Utc::now();
        payment.status = PaymentStatus::Confirmed;
        payment.confirmed_by = Some(actor.id.clone());
        payment.confirmed_at = Some(now);
        self.store.update_payment(payment.clone())?;

        invoice.status = InvoiceStatus::Paid;
        invoice.paid_at = Some(now);
        self.store.update_invoice(invoice.clone())?;

        let mut warnings = transition.warnings.clone();

        // The confirmation notice goes to whoever submitted the proof, which
        // is not necessarily the application owner. Agent disbursements stay
        // silent.
        if invoice.invoice_type == InvoiceType::Client {
            if let Err(error) = self.notifier.notify(Notification {
                recipient_id: payment.submitted_by.clone(),
                application_id: Some(payment.application_id.clone()),
                kind: NotificationType::PaymentConfirmed,
                title: "Payment Confirmed".to_string(),
                body: "Your payment has been confirmed. We are proceeding with your application."
                    .to_string(),
                action_url: Some("/payments".to_string()),
                channel: NotificationChannel::Both,
            }) {
                warnings.push(SideEffectWarning {
                    effect: "notify_submitter:Payment Confirmed".to_string(),
                    error: error.to_string(),
                });
            }
        }

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "payment.confirm".to_string(),
            resource_type: "payment",
            resource_id: id.0.clone(),
            new_values: Some(json!({ "status": PaymentStatus::Confirmed })),
            created_at: now,
        }) {
            warnings.push(SideEffectWarning {
                effect: "audit:payment.confirm".to_string(),
                error: error.to_string(),
            });
        }

        Ok(ConfirmPaymentOutcome {
            payment,
            invoice,
            transition,
            warnings,
        })
    }

    /// Reject a payment with a reason. The application status and the invoice
    /// are untouched; the client resubmits against the same invoice.
    pub fn reject_payment(
        &self,
        id: &PaymentId,
        reason: String,
        actor: &Actor,
    ) -> Result<RejectPaymentOutcome, BillingError> {
        let mut payment = self
            .store
            .fetch_payment(id)?
            .ok_or(BillingError::NotFound { resource: "payment" })?;

        let now = Utc::now();
        payment.status = PaymentStatus::Rejected;
        payment.notes = Some(reason.clone());
        self.store.update_payment(payment.clone())?;

        let mut warnings = Vec::new();
        if let Err(error) = self.notifier.notify(Notification {
            recipient_id: payment.submitted_by.clone(),
            application_id: Some(payment.application_id.clone()),
            kind: NotificationType::PaymentRejected,
            title: "Payment Rejected".to_string(),
            body: format!("Your payment proof was rejected. Reason: {reason}. Please resubmit."),
            action_url: Some("/payments".to_string()),
            channel: NotificationChannel::Both,
        }) {
            warnings.push(SideEffectWarning {
                effect: "notify_submitter:Payment Rejected".to_string(),
                error: error.to_string(),
            });
        }

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "payment.reject".to_string(),
            resource_type: "payment",
            resource_id: id.0.clone(),
            new_values: Some(json!({ "status": PaymentStatus::Rejected, "reason": reason })),
            created_at: now,
        }) {
            warnings.push(SideEffectWarning {
                effect: "audit:payment.reject".to_string(),
                error: error.to_string(),
            });
        }

        Ok(RejectPaymentOutcome { payment, warnings })
    }
}
