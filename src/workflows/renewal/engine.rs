use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde_json::json;

use super::domain::{
    Actor, Application, ApplicationId, AuditLogEntry, ServiceType, StatusHistoryEntry,
};
use super::effects::{self, SideEffectWarning};
use super::status::{ApplicationStatus, KycStatus};
use super::store::{CaseStore, NotificationDispatcher, StoreError};
use super::transitions::is_legal_transition;

/// Statuses from which the client may cancel their own application.
/// Deliberately narrower than the transition table's cancel edges: staff can
/// cancel from any non-terminal status, clients only from these early ones.
pub const CLIENT_CANCELLABLE: [ApplicationStatus; 5] = [
    ApplicationStatus::ClientRequest,
    ApplicationStatus::KycReview,
    ApplicationStatus::InvoiceSent,
    ApplicationStatus::PaymentPending,
    ApplicationStatus::DocumentCollection,
];

/// Validates and executes status transitions, applies their side effects, and
/// keeps the history and audit journals. Request-scoped and stateless between
/// calls; the store is the only shared mutable resource.
pub struct WorkflowEngine<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> (ApplicationId, String) {
    let seq = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let reference = format!("DM-{}-{seq:04}", Utc::now().year());
    (ApplicationId(format!("app-{seq:06}")), reference)
}

/// Result of a committed transition. `warnings` carries side-effect failures;
/// the status write and history entry have already succeeded when any warning
/// is present.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub application: Application,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub warnings: Vec<SideEffectWarning>,
}

/// Result of a KYC update. `transition` is populated only when the clear
/// result auto-advanced the main status.
#[derive(Debug)]
pub struct KycOutcome {
    pub application: Application,
    pub transition: Option<TransitionOutcome>,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("transition from {from} to {to} is not permitted")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application can no longer be cancelled while {status}")]
    NotCancellable { status: ApplicationStatus },
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    #[error("actor is not permitted to act on this resource")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl<S, N> WorkflowEngine<S, N>
where
    S: CaseStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<N> {
        &self.notifier
    }

    /// Create a new application at `client_request` with its opening history
    /// entry (`from = None`).
    pub fn open_application(
        &self,
        client: &Actor,
        service_type: ServiceType,
        form_data: Option<serde_json::Value>,
    ) -> Result<Application, WorkflowError> {
        let (id, reference_number) = next_application_id();
        let now = Utc::now();

        let application = Application {
            id: id.clone(),
            reference_number,
            client_id: client.id.clone(),
            service_type,
            status: ApplicationStatus::ClientRequest,
            kyc_status: KycStatus::Pending,
            kyc_notes: None,
            kyc_completed_by: None,
            kyc_completed_at: None,
            form_data,
            form_completed_at: None,
            government_submission_date: None,
            expected_completion_date: None,
            passport_office_reference: None,
            new_passport_number: None,
            passport_issued_date: None,
            client_acknowledged: false,
            acknowledgment_signed_at: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        let application = self.store.insert_application(application)?;
        self.store.append_history(StatusHistoryEntry {
            application_id: id.clone(),
            from: None,
            to: ApplicationStatus::ClientRequest,
            changed_by: client.id.clone(),
            reason: None,
            metadata: None,
            created_at: now,
        })?;

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: client.id.clone(),
            action: "application.create".to_string(),
            resource_type: "application",
            resource_id: id.0.clone(),
            new_values: Some(json!({
                "reference_number": application.reference_number,
                "service_type": application.service_type,
            })),
            created_at: now,
        }) {
            tracing::warn!(application = %id.0, %error, "audit append failed on create");
        }

        Ok(application)
    }

    /// Execute a requested transition. Re-reads the current status, rejects
    /// any pair absent from the transition table, writes the new status under
    /// the revision token, then appends history and fires side effects.
    pub fn transition(
        &self,
        id: &ApplicationId,
        target: ApplicationStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let application = self
            .store
            .fetch_application(id)?
            .ok_or(WorkflowError::NotFound {
                resource: "application",
            })?;

        let from = application.status;
        if !is_legal_transition(from, target) {
            return Err(WorkflowError::InvalidTransition { from, to: target });
        }

        self.commit_transition(application, target, actor, reason)
    }

    /// Set the KYC sub-status, and when it clears while the main status is
    /// still at `client_request` or `kyc_review`, advance to `invoice_sent`.
    /// The guard makes a repeated clear a no-op on the main status and keeps a
    /// late clear from rewinding a pipeline that has already moved on.
    pub fn apply_kyc_result(
        &self,
        id: &ApplicationId,
        kyc_status: KycStatus,
        notes: Option<String>,
        actor: &Actor,
    ) -> Result<KycOutcome, WorkflowError> {
        let mut application =
            self.store
                .fetch_application(id)?
                .ok_or(WorkflowError::NotFound {
                    resource: "application",
                })?;

        let now = Utc::now();
        application.kyc_status = kyc_status;
        application.kyc_notes = notes;
        if kyc_status == KycStatus::Pending {
            application.kyc_completed_at = None;
            application.kyc_completed_by = None;
        } else {
            application.kyc_completed_at = Some(now);
            application.kyc_completed_by = Some(actor.id.clone());
        }
        application.updated_at = now;

        let application = self.store.update_application(application)?;

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "application.kyc_update".to_string(),
            resource_type: "application",
            resource_id: id.0.clone(),
            new_values: Some(json!({ "kyc_status": kyc_status })),
            created_at: now,
        }) {
            tracing::warn!(application = %id.0, %error, "audit append failed on kyc update");
        }

        let may_advance = kyc_status == KycStatus::Clear
            && matches!(
                application.status,
                ApplicationStatus::ClientRequest | ApplicationStatus::KycReview
            );
        if !may_advance {
            return Ok(KycOutcome {
                application,
                transition: None,
            });
        }

        let outcome = self.commit_transition(
            application,
            ApplicationStatus::InvoiceSent,
            actor,
            Some("KYC cleared".to_string()),
        )?;
        Ok(KycOutcome {
            application: outcome.application.clone(),
            transition: Some(outcome),
        })
    }

    /// Client-initiated cancellation: ownership check, then the allow-list,
    /// then a regular transition to `cancelled`.
    pub fn client_cancel(
        &self,
        id: &ApplicationId,
        actor: &Actor,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let application = self
            .store
            .fetch_application(id)?
            .ok_or(WorkflowError::NotFound {
                resource: "application",
            })?;

        if application.client_id != actor.id {
            return Err(WorkflowError::Unauthorized);
        }
        if !CLIENT_CANCELLABLE.contains(&application.status) {
            return Err(WorkflowError::NotCancellable {
                status: application.status,
            });
        }

        let mut outcome = self.transition(
            id,
            ApplicationStatus::Cancelled,
            actor,
            Some("Cancelled by client".to_string()),
        )?;

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "application.cancel".to_string(),
            resource_type: "application",
            resource_id: id.0.clone(),
            new_values: Some(json!({ "cancelled_by": "client" })),
            created_at: Utc::now(),
        }) {
            outcome.warnings.push(SideEffectWarning {
                effect: "audit:application.cancel".to_string(),
                error: error.to_string(),
            });
        }

        Ok(outcome)
    }

    /// Apply a transition that has already passed its guard. The status write
    /// and history entry are the primary unit; side-effect and audit failures
    /// come back as warnings on a successful outcome.
    pub(crate) fn commit_transition(
        &self,
        mut application: Application,
        target: ApplicationStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let from = application.status;
        let now = Utc::now();
        application.status = target;
        application.updated_at = now;

        let application = self.store.update_application(application)?;

        self.store.append_history(StatusHistoryEntry {
            application_id: application.id.clone(),
            from: Some(from),
            to: target,
            changed_by: actor.id.clone(),
            reason: reason.clone(),
            metadata: None,
            created_at: now,
        })?;

        let mut warnings = effects::dispatch(self.notifier.as_ref(), &application, from, target);

        if let Err(error) = self.store.append_audit(AuditLogEntry {
            actor_id: actor.id.clone(),
            action: "application.status_change".to_string(),
            resource_type: "application",
            resource_id: application.id.0.clone(),
            new_values: Some(json!({ "status": target, "reason": reason })),
            created_at: now,
        }) {
            warnings.push(SideEffectWarning {
                effect: "audit:application.status_change".to_string(),
                error: error.to_string(),
            });
        }

        for warning in &warnings {
            tracing::warn!(
                application = %application.id.0,
                effect = %warning.effect,
                error = %warning.error,
                "side effect failed after committed transition"
            );
        }

        Ok(TransitionOutcome {
            application,
            from,
            to: target,
            warnings,
        })
    }
}
