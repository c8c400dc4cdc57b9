//! Payment state transition tests.

use billing_service::models::{
    BillingCycle, Payment, PaymentMethod, PaymentStatus, PlanTier, Subscription,
};
use mongodb::bson::DateTime;
use uuid::Uuid;

fn pending_payment() -> Payment {
    let account_id = Uuid::new_v4();
    let subscription = Subscription::new(account_id, PlanTier::Pro, BillingCycle::Monthly);
    let now = DateTime::now();
    Payment::new(
        account_id,
        &subscription,
        Some(PaymentMethod::Card),
        subscription.amount,
        now,
        now,
        subscription.end_date,
    )
}

#[test]
fn new_payment_is_pending_with_an_invoice_number() {
    let payment = pending_payment();

    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, 15_000);
    assert_eq!(payment.currency, "KRW");
    assert_eq!(payment.plan, PlanTier::Pro);
    assert_eq!(payment.billing_cycle, BillingCycle::Monthly);
    assert!(payment.receipt_number.is_none());

    let invoice = payment.invoice_number.expect("invoice number missing");
    assert!(invoice.starts_with("INV-"), "got {invoice}");
    // INV-YYYYMM-NNNN
    assert_eq!(invoice.len(), 15, "got {invoice}");
}

#[test]
fn completing_a_pending_payment_records_gateway_fields_and_receipt() {
    let mut payment = pending_payment();

    payment
        .complete(Some("txn_123".to_string()), Some("ok".to_string()))
        .expect("pending payment should complete");

    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.paid_date.is_some());
    assert_eq!(payment.gateway_txn_id.as_deref(), Some("txn_123"));

    let receipt = payment.receipt_number.expect("receipt number missing");
    assert!(receipt.starts_with("RCP-"), "got {receipt}");
    assert_eq!(receipt.len(), 15, "got {receipt}");
}

#[test]
fn completing_an_already_completed_payment_fails_without_writes() {
    let mut payment = pending_payment();
    payment.complete(Some("txn_1".to_string()), None).unwrap();
    let paid_date = payment.paid_date;
    let receipt = payment.receipt_number.clone();

    let result = payment.complete(Some("txn_2".to_string()), None);

    assert!(result.is_err());
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.paid_date, paid_date);
    assert_eq!(payment.receipt_number, receipt);
    assert_eq!(payment.gateway_txn_id.as_deref(), Some("txn_1"));
}

#[test]
fn failing_a_pending_payment_records_the_reason() {
    let mut payment = pending_payment();

    payment
        .fail("card declined".to_string())
        .expect("pending payment should fail");

    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some("card declined"));
}

#[test]
fn failed_and_refunded_are_terminal() {
    let mut payment = pending_payment();
    payment.fail("card declined".to_string()).unwrap();
    assert!(payment.complete(None, None).is_err());
    assert!(payment.fail("again".to_string()).is_err());
    assert!(payment.refund(None, None).is_err());

    let mut payment = pending_payment();
    payment.complete(None, None).unwrap();
    payment.refund(None, None).unwrap();
    assert!(payment.complete(None, None).is_err());
    assert!(payment.refund(None, None).is_err());
}

#[test]
fn refunding_a_non_completed_payment_fails() {
    let mut pending = pending_payment();
    assert!(pending.refund(None, None).is_err());
    assert_eq!(pending.status, PaymentStatus::Pending);

    let mut failed = pending_payment();
    failed.fail("card declined".to_string()).unwrap();
    assert!(failed.refund(None, None).is_err());
}

#[test]
fn refund_defaults_to_the_full_charged_amount() {
    let mut payment = pending_payment();
    payment.complete(None, None).unwrap();

    payment
        .refund(None, Some("course closed".to_string()))
        .expect("completed payment should refund");

    assert_eq!(payment.status, PaymentStatus::Refunded);
    assert_eq!(payment.refund_amount, Some(15_000));
    assert_eq!(payment.refund_reason.as_deref(), Some("course closed"));
    assert!(payment.refund_date.is_some());
}

#[test]
fn partial_refund_uses_the_explicit_amount() {
    let mut payment = pending_payment();
    payment.complete(None, None).unwrap();

    payment.refund(Some(5_000), None).unwrap();

    assert_eq!(payment.refund_amount, Some(5_000));
}

#[test]
fn refund_above_the_charged_amount_is_rejected() {
    let mut payment = pending_payment();
    payment.complete(None, None).unwrap();

    assert!(payment.refund(Some(20_000), None).is_err());
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.refund_amount, None);
}
