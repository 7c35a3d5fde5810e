use super::common::*;

use crate::workflows::renewal::engine::{WorkflowError, CLIENT_CANCELLABLE};
use crate::workflows::renewal::status::ApplicationStatus;
use crate::workflows::renewal::store::CaseStore;

use ApplicationStatus::*;

#[test]
fn client_can_cancel_from_every_allow_listed_status() {
    for status in CLIENT_CANCELLABLE {
        let (engine, store, _) = build_engine();
        let owner = client();
        let application = open_case(&engine, &owner);
        drive_to(&engine, &application.id, status, &processor());

        let outcome = engine
            .client_cancel(&application.id, &owner)
            .unwrap_or_else(|error| panic!("cancel from {status} must succeed: {error}"));

        assert_eq!(outcome.from, status);
        assert_eq!(outcome.to, Cancelled);
        assert_status(&store, &application.id, Cancelled);

        let history = store.history_for(&application.id).expect("history fetch");
        let last = history.last().expect("entry");
        assert_eq!(last.to, Cancelled);
        assert_eq!(last.reason.as_deref(), Some("Cancelled by client"));
        assert_eq!(last.changed_by, owner.id);
    }
}

#[test]
fn client_cannot_cancel_outside_the_allow_list() {
    let blocked = [
        PaymentConfirmed,
        AgentPaymentPending,
        FinalReview,
        GovernmentSubmitted,
        Tracking,
        PassportIssued,
        Completed,
        OnHold,
        Cancelled,
    ];

    for status in blocked {
        let (engine, store, _) = build_engine();
        let owner = client();
        let application = open_case(&engine, &owner);
        drive_to(&engine, &application.id, status, &processor());
        let before = history_len(&store, &application.id);

        let error = engine
            .client_cancel(&application.id, &owner)
            .expect_err("cancel outside the allow-list must fail");

        assert!(
            matches!(error, WorkflowError::NotCancellable { status: rejected } if rejected == status),
            "unexpected error from {status}: {error}"
        );
        assert_status(&store, &application.id, status);
        assert_eq!(history_len(&store, &application.id), before);
    }
}

#[test]
fn only_the_owner_may_cancel() {
    let (engine, store, _) = build_engine();
    let application = open_case(&engine, &client());

    let error = engine
        .client_cancel(&application.id, &other_client())
        .expect_err("foreign actor must be rejected");

    assert!(matches!(error, WorkflowError::Unauthorized));
    assert_status(&store, &application.id, ApplicationStatus::ClientRequest);
}

#[test]
fn staff_can_still_cancel_from_late_statuses_via_transition() {
    // The allow-list binds clients only; the transition table gives staff a
    // cancel edge from any non-terminal status.
    let (engine, store, _) = build_engine();
    let application = open_case(&engine, &client());
    drive_to(&engine, &application.id, Tracking, &processor());

    engine
        .transition(
            &application.id,
            Cancelled,
            &processor(),
            Some("Client unreachable".to_string()),
        )
        .expect("staff cancel succeeds");

    assert_status(&store, &application.id, Cancelled);
}

#[test]
fn cancelled_cases_accept_no_further_transitions() {
    let (engine, store, _) = build_engine();
    let owner = client();
    let application = open_case(&engine, &owner);
    engine
        .client_cancel(&application.id, &owner)
        .expect("cancel succeeds");

    let error = engine
        .transition(&application.id, KycReview, &processor(), None)
        .expect_err("terminal status has no outgoing edges");

    assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
    assert_status(&store, &application.id, Cancelled);
}
