use std::fmt;

use serde::{Deserialize, Serialize};

/// Every state a renewal case can occupy. Ten pipeline statuses move a case
/// from intake to issuance; `Completed`, `OnHold`, and `Cancelled` sit outside
/// the pipeline ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    ClientRequest,
    KycReview,
    InvoiceSent,
    PaymentPending,
    PaymentConfirmed,
    AgentPaymentPending,
    DocumentCollection,
    FinalReview,
    GovernmentSubmitted,
    Tracking,
    PassportIssued,
    Completed,
    OnHold,
    Cancelled,
}

impl ApplicationStatus {
    /// The happy path in processing order. Used for progress display only,
    /// never for transition legality.
    pub const fn pipeline() -> [Self; 10] {
        [
            Self::ClientRequest,
            Self::KycReview,
            Self::InvoiceSent,
            Self::PaymentPending,
            Self::PaymentConfirmed,
            Self::AgentPaymentPending,
            Self::DocumentCollection,
            Self::FinalReview,
            Self::GovernmentSubmitted,
            Self::Tracking,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ClientRequest => "Client Request",
            Self::KycReview => "KYC Review",
            Self::InvoiceSent => "Invoice Sent",
            Self::PaymentPending => "Payment Pending",
            Self::PaymentConfirmed => "Payment Confirmed",
            Self::AgentPaymentPending => "Agent Payment Pending",
            Self::DocumentCollection => "Document Collection",
            Self::FinalReview => "Final Review",
            Self::GovernmentSubmitted => "Government Submitted",
            Self::Tracking => "Tracking",
            Self::PassportIssued => "Passport Issued",
            Self::Completed => "Completed",
            Self::OnHold => "On Hold",
            Self::Cancelled => "Cancelled",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientRequest => "client_request",
            Self::KycReview => "kyc_review",
            Self::InvoiceSent => "invoice_sent",
            Self::PaymentPending => "payment_pending",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::AgentPaymentPending => "agent_payment_pending",
            Self::DocumentCollection => "document_collection",
            Self::FinalReview => "final_review",
            Self::GovernmentSubmitted => "government_submitted",
            Self::Tracking => "tracking",
            Self::PassportIssued => "passport_issued",
            Self::Completed => "completed",
            Self::OnHold => "on_hold",
            Self::Cancelled => "cancelled",
        }
    }

    /// Position within the ordered pipeline, counting `PassportIssued` as the
    /// final step. `None` for the out-of-band statuses.
    pub fn pipeline_index(self) -> Option<usize> {
        if self == Self::PassportIssued {
            return Some(Self::pipeline().len());
        }
        Self::pipeline().iter().position(|status| *status == self)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// KYC runs as a sub-status beside the main workflow. Clearing it is the only
/// external trigger allowed to auto-advance the main status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Clear,
    Flagged,
    ReviewRequired,
}

impl KycStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Clear => "Clear",
            Self::Flagged => "Flagged",
            Self::ReviewRequired => "Review Required",
        }
    }
}

/// Display metadata for one pipeline step, consumed by progress timelines.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorkflowStep {
    pub step: u8,
    pub status: ApplicationStatus,
    pub label: &'static str,
    pub description: &'static str,
    pub responsible_party: &'static str,
}

/// The canonical step sequence shown to clients and staff, through issuance.
pub const WORKFLOW_STEPS: [WorkflowStep; 11] = [
    WorkflowStep {
        step: 1,
        status: ApplicationStatus::ClientRequest,
        label: "Client Request",
        description: "Client initiates renewal and provides documents",
        responsible_party: "Client",
    },
    WorkflowStep {
        step: 2,
        status: ApplicationStatus::KycReview,
        label: "KYC & Document Review",
        description: "Processing team runs KYC and reviews required documents",
        responsible_party: "Processing Team",
    },
    WorkflowStep {
        step: 3,
        status: ApplicationStatus::InvoiceSent,
        label: "Invoice Sent",
        description: "Processing shares invoice with payment instructions",
        responsible_party: "Processing / Finance",
    },
    WorkflowStep {
        step: 4,
        status: ApplicationStatus::PaymentPending,
        label: "Client Payment",
        description: "Client pays invoice and provides proof of payment",
        responsible_party: "Client",
    },
    WorkflowStep {
        step: 5,
        status: ApplicationStatus::PaymentConfirmed,
        label: "Payment Confirmed",
        description: "Finance confirms the client payment",
        responsible_party: "Finance",
    },
    WorkflowStep {
        step: 6,
        status: ApplicationStatus::AgentPaymentPending,
        label: "Agent Payment",
        description: "Finance transfers funds to the local agent",
        responsible_party: "Finance",
    },
    WorkflowStep {
        step: 7,
        status: ApplicationStatus::DocumentCollection,
        label: "Document Collection",
        description: "Processing collects documents and completes the application form",
        responsible_party: "Processing",
    },
    WorkflowStep {
        step: 8,
        status: ApplicationStatus::FinalReview,
        label: "Final Review",
        description: "Processing reviews all documents for completeness",
        responsible_party: "Processing / Local Agent",
    },
    WorkflowStep {
        step: 9,
        status: ApplicationStatus::GovernmentSubmitted,
        label: "Government Submission",
        description: "Local agent submits to the passport office",
        responsible_party: "Local Agent",
    },
    WorkflowStep {
        step: 10,
        status: ApplicationStatus::Tracking,
        label: "Tracking",
        description: "Processing tracks the case and updates expected completion",
        responsible_party: "Processing / Local Agent",
    },
    WorkflowStep {
        step: 11,
        status: ApplicationStatus::PassportIssued,
        label: "Passport Issued",
        description: "New passport issued, client confirms and collects",
        responsible_party: "Passport Office / Client",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_indexes_are_strictly_increasing() {
        let indexes: Vec<usize> = ApplicationStatus::pipeline()
            .iter()
            .map(|status| status.pipeline_index().expect("pipeline status"))
            .collect();
        for pair in indexes.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(
            ApplicationStatus::PassportIssued.pipeline_index(),
            Some(ApplicationStatus::pipeline().len())
        );
    }

    #[test]
    fn out_of_band_statuses_have_no_pipeline_index() {
        assert_eq!(ApplicationStatus::Completed.pipeline_index(), None);
        assert_eq!(ApplicationStatus::OnHold.pipeline_index(), None);
        assert_eq!(ApplicationStatus::Cancelled.pipeline_index(), None);
    }

    #[test]
    fn only_completed_and_cancelled_are_terminal() {
        for status in ApplicationStatus::pipeline() {
            assert!(!status.is_terminal(), "{status} must not be terminal");
        }
        assert!(!ApplicationStatus::PassportIssued.is_terminal());
        assert!(!ApplicationStatus::OnHold.is_terminal());
        assert!(ApplicationStatus::Completed.is_terminal());
        assert!(ApplicationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn wire_names_round_trip_through_serde() {
        let json = serde_json::to_string(&ApplicationStatus::AgentPaymentPending).expect("encode");
        assert_eq!(json, "\"agent_payment_pending\"");
        let decoded: ApplicationStatus = serde_json::from_str(&json).expect("decode");
        assert_eq!(decoded, ApplicationStatus::AgentPaymentPending);
    }

    #[test]
    fn steps_cover_the_pipeline_in_order() {
        assert_eq!(WORKFLOW_STEPS.len(), 11);
        for (position, step) in WORKFLOW_STEPS.iter().enumerate() {
            assert_eq!(step.step as usize, position + 1);
            assert_eq!(step.status.pipeline_index(), Some(position));
        }
    }
}
