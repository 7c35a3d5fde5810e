use super::common::*;

use crate::workflows::renewal::billing::BillingError;
use crate::workflows::renewal::domain::{
    InvoiceStatus, NotificationType, PaymentStatus, Role,
};
use crate::workflows::renewal::engine::WorkflowError;
use crate::workflows::renewal::status::{ApplicationStatus, KycStatus};
use crate::workflows::renewal::store::CaseStore;

use ApplicationStatus::*;

#[test]
fn invoice_amount_must_match_line_item_totals() {
    let (engine, billing, _, _) = build_billing();
    let application = open_case(&engine, &client());

    let mut draft = client_invoice_draft(&application, 15_000);
    draft.amount_cents = 14_000;

    let error = billing
        .create_invoice(draft, &processor())
        .expect_err("mismatched totals must fail");
    assert!(matches!(
        error,
        BillingError::AmountMismatch {
            amount_cents: 14_000,
            line_total_cents: 15_000,
        }
    ));
}

#[test]
fn invoice_requires_at_least_one_line_item() {
    let (engine, billing, _, _) = build_billing();
    let application = open_case(&engine, &client());

    let mut draft = client_invoice_draft(&application, 0);
    draft.line_items.clear();

    let error = billing
        .create_invoice(draft, &processor())
        .expect_err("empty invoice must fail");
    assert!(matches!(error, BillingError::EmptyLineItems));
}

#[test]
fn invoice_requires_an_existing_application() {
    let (engine, billing, _, _) = build_billing();
    let mut application = open_case(&engine, &client());
    application.id = crate::workflows::renewal::domain::ApplicationId("app-missing".to_string());

    let error = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect_err("unknown application must fail");
    assert!(matches!(error, BillingError::NotFound { .. }));
}

#[test]
fn sending_a_client_invoice_advances_to_payment_pending() {
    let (engine, billing, store, notifier) = build_billing();
    let application = open_case(&engine, &client());
    engine
        .apply_kyc_result(&application.id, KycStatus::Clear, None, &processor())
        .expect("kyc clears");

    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");
    assert_eq!(invoice.status, InvoiceStatus::Draft);

    let outcome = billing
        .send_invoice(&invoice.id, &processor())
        .expect("send succeeds");

    assert_eq!(outcome.invoice.status, InvoiceStatus::Sent);
    assert!(outcome.invoice.sent_at.is_some());
    let transition = outcome.transition.expect("client invoice advances the case");
    assert_eq!(transition.to, PaymentPending);
    assert_status(&store, &application.id, PaymentPending);

    let sent = notifier.sent();
    let request = sent
        .iter()
        .find(|notification| notification.kind == NotificationType::PaymentRequest)
        .expect("payment request delivered");
    assert_eq!(request.recipient_id, application.client_id);
    assert_eq!(request.title, "Invoice Ready");
}

#[test]
fn sending_a_client_invoice_out_of_order_rejects_before_stamping() {
    let (engine, billing, store, _) = build_billing();
    let application = open_case(&engine, &client());

    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");

    let error = billing
        .send_invoice(&invoice.id, &processor())
        .expect_err("client_request cannot jump to payment_pending");
    assert!(matches!(
        error,
        BillingError::Workflow(WorkflowError::InvalidTransition { .. })
    ));

    let stored = store
        .fetch_invoice(&invoice.id)
        .expect("fetch succeeds")
        .expect("invoice exists");
    assert_eq!(stored.status, InvoiceStatus::Draft);
    assert!(stored.sent_at.is_none());
    assert_status(&store, &application.id, ClientRequest);
}

#[test]
fn sending_an_agent_invoice_leaves_the_application_alone() {
    let (engine, billing, store, _) = build_billing();
    let application = open_case(&engine, &client());
    drive_to(&engine, &application.id, AgentPaymentPending, &processor());

    let invoice = billing
        .create_invoice(agent_invoice_draft(&application, 80_000), &processor())
        .expect("invoice creates");
    let outcome = billing
        .send_invoice(&invoice.id, &finance())
        .expect("send succeeds");

    assert!(outcome.transition.is_none());
    assert_eq!(outcome.invoice.status, InvoiceStatus::Sent);
    assert_status(&store, &application.id, AgentPaymentPending);
}

#[test]
fn submitting_payment_alerts_finance_without_touching_status() {
    let (engine, billing, store, notifier) = build_billing();
    store.register_staff(&finance());
    store.register_staff(&crate::workflows::renewal::domain::Actor::new(
        "staff-admin",
        Role::Admin,
    ));

    let application = open_case(&engine, &client());
    engine
        .apply_kyc_result(&application.id, KycStatus::Clear, None, &processor())
        .expect("kyc clears");
    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");
    billing
        .send_invoice(&invoice.id, &processor())
        .expect("send succeeds");

    let outcome = billing
        .submit_payment(payment_draft(&invoice.id, 15_000), &client())
        .expect("submission succeeds");

    assert_eq!(outcome.payment.status, PaymentStatus::Submitted);
    assert_eq!(outcome.payment.submitted_by, client().id);
    assert!(outcome.warnings.is_empty());
    assert_status(&store, &application.id, PaymentPending);

    let staff_alerts: Vec<_> = notifier
        .sent()
        .into_iter()
        .filter(|notification| notification.title == "Payment Proof Submitted")
        .collect();
    assert_eq!(staff_alerts.len(), 2, "finance and admin both alerted");
}

#[test]
fn confirming_a_client_payment_marks_paid_and_advances() {
    let (engine, billing, store, notifier) = build_billing();
    let application = open_case(&engine, &client());
    engine
        .apply_kyc_result(&application.id, KycStatus::Clear, None, &processor())
        .expect("kyc clears");
    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");
    billing
        .send_invoice(&invoice.id, &processor())
        .expect("send succeeds");
    let submitted = billing
        .submit_payment(payment_draft(&invoice.id, 15_000), &client())
        .expect("submission succeeds");

    let outcome = billing
        .confirm_payment(&submitted.payment.id, &finance())
        .expect("confirmation succeeds");

    assert_eq!(outcome.payment.status, PaymentStatus::Confirmed);
    assert_eq!(outcome.payment.confirmed_by, Some(finance().id));
    assert!(outcome.payment.confirmed_at.is_some());
    assert_eq!(outcome.invoice.status, InvoiceStatus::Paid);
    assert!(outcome.invoice.paid_at.is_some());
    assert_eq!(outcome.transition.to, PaymentConfirmed);
    assert_status(&store, &application.id, PaymentConfirmed);

    let confirmations: Vec<_> = notifier
        .sent()
        .into_iter()
        .filter(|notification| notification.kind == NotificationType::PaymentConfirmed)
        .collect();
    assert_eq!(confirmations.len(), 1, "exactly one client confirmation");
    assert_eq!(confirmations[0].recipient_id, application.client_id);
}

#[test]
fn confirmation_notice_goes_to_the_payment_submitter() {
    let (engine, billing, _, notifier) = build_billing();
    let application = open_case(&engine, &client());
    engine
        .apply_kyc_result(&application.id, KycStatus::Clear, None, &processor())
        .expect("kyc clears");
    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");
    billing
        .send_invoice(&invoice.id, &processor())
        .expect("send succeeds");

    // A relative pays on the client's behalf; the notice follows the proof.
    let payer = crate::workflows::renewal::domain::Actor::new("client-relative", Role::Client);
    let submitted = billing
        .submit_payment(payment_draft(&invoice.id, 15_000), &payer)
        .expect("submission succeeds");
    billing
        .confirm_payment(&submitted.payment.id, &finance())
        .expect("confirmation succeeds");

    let confirmations: Vec<_> = notifier
        .sent()
        .into_iter()
        .filter(|notification| notification.kind == NotificationType::PaymentConfirmed)
        .collect();
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].recipient_id, payer.id);
    assert_ne!(confirmations[0].recipient_id, application.client_id);
}

#[test]
fn confirming_an_agent_payment_advances_to_document_collection() {
    let (engine, billing, store, notifier) = build_billing();
    let application = open_case(&engine, &client());
    drive_to(&engine, &application.id, AgentPaymentPending, &processor());

    let invoice = billing
        .create_invoice(agent_invoice_draft(&application, 80_000), &processor())
        .expect("invoice creates");
    billing
        .send_invoice(&invoice.id, &finance())
        .expect("send succeeds");
    let submitted = billing
        .submit_payment(payment_draft(&invoice.id, 80_000), &finance())
        .expect("submission succeeds");

    let outcome = billing
        .confirm_payment(&submitted.payment.id, &finance())
        .expect("confirmation succeeds");

    assert_eq!(outcome.transition.to, DocumentCollection);
    assert_eq!(outcome.invoice.status, InvoiceStatus::Paid);
    assert_status(&store, &application.id, DocumentCollection);

    // The client confirmation notice is reserved for client invoices.
    assert!(notifier
        .sent()
        .iter()
        .all(|notification| notification.kind != NotificationType::PaymentConfirmed));
}

#[test]
fn out_of_order_confirmation_rejects_before_any_write() {
    let (engine, billing, store, _) = build_billing();
    let application = open_case(&engine, &client());
    engine
        .apply_kyc_result(&application.id, KycStatus::Clear, None, &processor())
        .expect("kyc clears");
    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");
    // Invoice never sent, so the case is still at invoice_sent.
    let submitted = billing
        .submit_payment(payment_draft(&invoice.id, 15_000), &client())
        .expect("submission succeeds");

    let error = billing
        .confirm_payment(&submitted.payment.id, &finance())
        .expect_err("invoice_sent cannot jump to payment_confirmed");
    assert!(matches!(
        error,
        BillingError::Workflow(WorkflowError::InvalidTransition { .. })
    ));

    let payment = store
        .fetch_payment(&submitted.payment.id)
        .expect("fetch succeeds")
        .expect("payment exists");
    assert_eq!(payment.status, PaymentStatus::Submitted);
    let stored_invoice = store
        .fetch_invoice(&invoice.id)
        .expect("fetch succeeds")
        .expect("invoice exists");
    assert_ne!(stored_invoice.status, InvoiceStatus::Paid);
    assert_status(&store, &application.id, InvoiceSent);
}

#[test]
fn a_paid_invoice_cannot_be_sent_again() {
    let (engine, billing, store, _) = build_billing();
    let application = open_case(&engine, &client());
    engine
        .apply_kyc_result(&application.id, KycStatus::Clear, None, &processor())
        .expect("kyc clears");
    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");
    billing
        .send_invoice(&invoice.id, &processor())
        .expect("first send succeeds");
    let submitted = billing
        .submit_payment(payment_draft(&invoice.id, 15_000), &client())
        .expect("submission succeeds");
    billing
        .confirm_payment(&submitted.payment.id, &finance())
        .expect("confirmation succeeds");

    let error = billing
        .send_invoice(&invoice.id, &processor())
        .expect_err("a paid invoice is final");
    assert!(matches!(
        error,
        BillingError::NotSendable {
            status: InvoiceStatus::Paid,
        }
    ));

    let stored = store
        .fetch_invoice(&invoice.id)
        .expect("fetch succeeds")
        .expect("invoice exists");
    assert_eq!(stored.status, InvoiceStatus::Paid);
}

#[test]
fn a_rejected_payment_cannot_be_confirmed_later() {
    let (engine, billing, store, _) = build_billing();
    let application = open_case(&engine, &client());
    engine
        .apply_kyc_result(&application.id, KycStatus::Clear, None, &processor())
        .expect("kyc clears");
    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");
    billing
        .send_invoice(&invoice.id, &processor())
        .expect("send succeeds");
    let submitted = billing
        .submit_payment(payment_draft(&invoice.id, 15_000), &client())
        .expect("submission succeeds");
    billing
        .reject_payment(
            &submitted.payment.id,
            "Illegible proof".to_string(),
            &finance(),
        )
        .expect("rejection succeeds");

    let error = billing
        .confirm_payment(&submitted.payment.id, &finance())
        .expect_err("rejected proof stays rejected");
    assert!(matches!(
        error,
        BillingError::NotConfirmable {
            status: PaymentStatus::Rejected,
        }
    ));
    assert_status(&store, &application.id, PaymentPending);
}

#[test]
fn rejecting_a_payment_leaves_the_invoice_payable() {
    let (engine, billing, store, notifier) = build_billing();
    let application = open_case(&engine, &client());
    engine
        .apply_kyc_result(&application.id, KycStatus::Clear, None, &processor())
        .expect("kyc clears");
    let invoice = billing
        .create_invoice(client_invoice_draft(&application, 15_000), &processor())
        .expect("invoice creates");
    billing
        .send_invoice(&invoice.id, &processor())
        .expect("send succeeds");
    let submitted = billing
        .submit_payment(payment_draft(&invoice.id, 15_000), &client())
        .expect("submission succeeds");

    let outcome = billing
        .reject_payment(
            &submitted.payment.id,
            "Amount on proof does not match".to_string(),
            &finance(),
        )
        .expect("rejection succeeds");

    assert_eq!(outcome.payment.status, PaymentStatus::Rejected);
    assert_eq!(
        outcome.payment.notes.as_deref(),
        Some("Amount on proof does not match")
    );
    assert_status(&store, &application.id, PaymentPending);

    let stored_invoice = store
        .fetch_invoice(&invoice.id)
        .expect("fetch succeeds")
        .expect("invoice exists");
    assert_eq!(stored_invoice.status, InvoiceStatus::Sent);

    let rejection = notifier
        .sent()
        .into_iter()
        .find(|notification| notification.kind == NotificationType::PaymentRejected)
        .expect("submitter notified");
    assert_eq!(rejection.recipient_id, client().id);

    // The client resubmits against the same invoice and the flow completes.
    let resubmitted = billing
        .submit_payment(payment_draft(&invoice.id, 15_000), &client())
        .expect("resubmission succeeds");
    let confirmed = billing
        .confirm_payment(&resubmitted.payment.id, &finance())
        .expect("confirmation succeeds");
    assert_eq!(confirmed.transition.to, PaymentConfirmed);
}
