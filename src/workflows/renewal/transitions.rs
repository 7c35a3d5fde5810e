use super::status::ApplicationStatus;

/// Legal next statuses for a given current status. This table is the sole
/// source of truth for legality; the pipeline ordering in `status` is display
/// metadata only. `OnHold` fans out to every pipeline status, which is why
/// legality is never inferred from ordering comparisons.
pub fn allowed_transitions(from: ApplicationStatus) -> &'static [ApplicationStatus] {
    use ApplicationStatus::*;

    match from {
        ClientRequest => &[KycReview, OnHold, Cancelled],
        KycReview => &[InvoiceSent, OnHold, Cancelled],
        InvoiceSent => &[PaymentPending, OnHold, Cancelled],
        PaymentPending => &[PaymentConfirmed, OnHold, Cancelled],
        PaymentConfirmed => &[AgentPaymentPending, OnHold, Cancelled],
        AgentPaymentPending => &[DocumentCollection, OnHold, Cancelled],
        DocumentCollection => &[FinalReview, OnHold, Cancelled],
        FinalReview => &[GovernmentSubmitted, OnHold, Cancelled],
        GovernmentSubmitted => &[Tracking, OnHold, Cancelled],
        Tracking => &[PassportIssued, OnHold, Cancelled],
        PassportIssued => &[Completed, OnHold, Cancelled],
        OnHold => &[
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
            Cancelled,
        ],
        Completed | Cancelled => &[],
    }
}

pub fn is_legal_transition(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    allowed_transitions(from).contains(&to)
}
