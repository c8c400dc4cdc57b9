//! Subscription creation semantics.

use billing_service::models::{
    BillingCycle, PlanTier, Subscription, SubscriptionPaymentStatus, SubscriptionStatus,
};
use uuid::Uuid;

#[test]
fn starter_subscription_is_active_with_no_trial() {
    let subscription = Subscription::new(Uuid::new_v4(), PlanTier::Starter, BillingCycle::Monthly);

    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(
        subscription.payment_status,
        SubscriptionPaymentStatus::Paid
    );
    assert!(subscription.trial_end_date.is_none());
    assert_eq!(subscription.amount, 0);
    assert!(!subscription.auto_renew);

    // Nominal 1-year term for the free tier.
    let term = subscription.end_date.to_chrono() - subscription.start_date.to_chrono();
    assert_eq!(term.num_days(), 365);
}

#[test]
fn paid_subscription_starts_in_trial_with_14_day_window() {
    let subscription = Subscription::new(Uuid::new_v4(), PlanTier::Pro, BillingCycle::Monthly);

    assert_eq!(subscription.status, SubscriptionStatus::Trial);
    assert_eq!(
        subscription.payment_status,
        SubscriptionPaymentStatus::Pending
    );
    assert_eq!(subscription.amount, 15_000);
    assert!(subscription.auto_renew);

    let trial_end = subscription.trial_end_date.expect("trial end date missing");
    let window = trial_end.to_chrono() - subscription.start_date.to_chrono();
    assert_eq!(window.num_days(), 14);

    // Until the first charge, the trial end is the end of the subscription.
    assert_eq!(subscription.end_date, trial_end);
    assert_eq!(subscription.next_billing_date, Some(trial_end));
}

#[test]
fn premium_yearly_snapshot_matches_the_catalog() {
    let subscription = Subscription::new(Uuid::new_v4(), PlanTier::Premium, BillingCycle::Yearly);

    assert_eq!(subscription.status, SubscriptionStatus::Trial);
    assert_eq!(subscription.amount, 290_000);
    assert_eq!(subscription.features.max_courses, -1);
    assert_eq!(subscription.features.max_students, -1);
    assert!(subscription.features.white_label);
}

#[test]
fn new_subscription_starts_with_zero_usage() {
    let subscription = Subscription::new(Uuid::new_v4(), PlanTier::Pro, BillingCycle::Monthly);

    assert_eq!(subscription.usage.courses_created, 0);
    assert_eq!(subscription.usage.students_enrolled, 0);
    assert_eq!(subscription.usage.api_calls, 0);
}

#[test]
fn trial_and_active_subscriptions_are_current() {
    let mut subscription = Subscription::new(Uuid::new_v4(), PlanTier::Pro, BillingCycle::Monthly);
    assert!(subscription.is_current());

    subscription.status = SubscriptionStatus::Active;
    assert!(subscription.is_current());

    subscription.status = SubscriptionStatus::Cancelled;
    assert!(!subscription.is_current());

    subscription.status = SubscriptionStatus::Expired;
    assert!(!subscription.is_current());
}
