//! Subscription model and its lifecycle transitions.
//!
//! Transitions are pure mutations on the document; persistence lives in the
//! repository. At most one subscription per account may be `trial` or `active`,
//! backed by a partial unique index on `account_id`.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::plan::{
    plan_features, plan_price, BillingCycle, FeatureSet, PlanTier, CURRENCY, UNLIMITED,
};

/// Trial window for paid tiers.
pub const TRIAL_DAYS: i64 = 14;

/// Nominal term for the free tier, which has no billing period of its own.
const STARTER_TERM_DAYS: i64 = 365;

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Inactive,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "trial" => SubscriptionStatus::Trial,
            "inactive" => SubscriptionStatus::Inactive,
            "cancelled" => SubscriptionStatus::Cancelled,
            "expired" => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::Active,
        }
    }
}

/// Settlement state of the current billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl SubscriptionPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPaymentStatus::Pending => "pending",
            SubscriptionPaymentStatus::Paid => "paid",
            SubscriptionPaymentStatus::Failed => "failed",
        }
    }
}

/// Per-subscription metered usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub courses_created: i64,
    pub students_enrolled: i64,
    pub api_calls: i64,
}

/// Metered resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Course,
    Student,
    Api,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Course => "course",
            UsageKind::Student => "student",
            UsageKind::Api => "api",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "student" => UsageKind::Student,
            "api" => UsageKind::Api,
            _ => UsageKind::Course,
        }
    }

    /// Document path of the counter this kind increments.
    pub fn counter_field(&self) -> &'static str {
        match self {
            UsageKind::Course => "usage.courses_created",
            UsageKind::Student => "usage.students_enrolled",
            UsageKind::Api => "usage.api_calls",
        }
    }

    /// Document path of the ceiling for this kind, if any. API calls are unmetered.
    pub fn ceiling_field(&self) -> Option<&'static str> {
        match self {
            UsageKind::Course => Some("features.max_courses"),
            UsageKind::Student => Some("features.max_students"),
            UsageKind::Api => None,
        }
    }
}

impl std::fmt::Display for UsageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("upgrade target {target} does not rank above current plan {current}")]
    NotAnUpgrade { current: PlanTier, target: PlanTier },
}

/// One account's billing relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub account_id: Uuid,
    pub plan: PlanTier,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub payment_status: SubscriptionPaymentStatus,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub next_billing_date: Option<DateTime>,
    pub trial_end_date: Option<DateTime>,
    pub amount: i64,
    pub currency: String,
    pub auto_renew: bool,
    pub features: FeatureSet,
    pub usage: UsageCounters,
    pub cancelled_at: Option<DateTime>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Subscription {
    /// Create a subscription with features and price snapshotted from the catalog.
    ///
    /// The free tier starts `active` with a nominal 1-year term. Paid tiers
    /// start in `trial` with a 14-day window; the first charge is due when the
    /// trial ends.
    pub fn new(account_id: Uuid, plan: PlanTier, billing_cycle: BillingCycle) -> Self {
        let now = chrono::Utc::now();
        let features = plan_features(plan);
        let amount = plan_price(plan, billing_cycle);

        let (status, payment_status, trial_end_date, end_date, next_billing_date) = if amount == 0 {
            let end = now + chrono::Duration::days(STARTER_TERM_DAYS);
            (
                SubscriptionStatus::Active,
                SubscriptionPaymentStatus::Paid,
                None,
                end,
                None,
            )
        } else {
            let trial_end = now + chrono::Duration::days(TRIAL_DAYS);
            (
                SubscriptionStatus::Trial,
                SubscriptionPaymentStatus::Pending,
                Some(trial_end),
                trial_end,
                Some(trial_end),
            )
        };

        Self {
            id: Uuid::new_v4(),
            account_id,
            plan,
            billing_cycle,
            status,
            payment_status,
            start_date: DateTime::from_chrono(now),
            end_date: DateTime::from_chrono(end_date),
            next_billing_date: next_billing_date.map(DateTime::from_chrono),
            trial_end_date: trial_end_date.map(DateTime::from_chrono),
            amount,
            currency: CURRENCY.to_string(),
            auto_renew: amount > 0,
            features,
            usage: UsageCounters::default(),
            cancelled_at: None,
            cancellation_reason: None,
            created_at: DateTime::from_chrono(now),
            updated_at: DateTime::from_chrono(now),
        }
    }

    /// True while the subscription counts against the one-per-account invariant.
    pub fn is_current(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Trial | SubscriptionStatus::Active
        )
    }

    /// Move to a strictly higher tier.
    ///
    /// Replaces plan, cycle, features and amount, forces the subscription
    /// active with auto-renew, and restarts the term from now. No proration:
    /// remaining time on the old plan is discarded and the full new-tier price
    /// is charged.
    pub fn upgrade_to(
        &mut self,
        plan: PlanTier,
        billing_cycle: BillingCycle,
    ) -> Result<(), SubscriptionError> {
        if plan.rank() <= self.plan.rank() {
            return Err(SubscriptionError::NotAnUpgrade {
                current: self.plan,
                target: plan,
            });
        }

        let now = chrono::Utc::now();
        let end = now + chrono::Duration::days(billing_cycle.period_days());

        self.plan = plan;
        self.billing_cycle = billing_cycle;
        self.features = plan_features(plan);
        self.amount = plan_price(plan, billing_cycle);
        self.status = SubscriptionStatus::Active;
        self.payment_status = SubscriptionPaymentStatus::Pending;
        self.auto_renew = true;
        self.trial_end_date = None;
        self.end_date = DateTime::from_chrono(end);
        self.next_billing_date = Some(DateTime::from_chrono(end));
        self.updated_at = DateTime::from_chrono(now);
        Ok(())
    }

    /// Cancel the subscription. Usage history and past payments are kept; there
    /// is no reactivation, only a fresh subscription after this one no longer
    /// counts as current.
    pub fn cancel(&mut self, reason: Option<String>) {
        let now = DateTime::now();
        self.status = SubscriptionStatus::Cancelled;
        self.auto_renew = false;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        self.updated_at = now;
    }

    /// Restart the billing term from now. A late renewal does not stack onto
    /// unused time; the clock always resets from the moment of renewal.
    pub fn renew(&mut self) {
        let now = chrono::Utc::now();
        let end = now + chrono::Duration::days(self.billing_cycle.period_days());
        self.status = SubscriptionStatus::Active;
        self.end_date = DateTime::from_chrono(end);
        self.next_billing_date = Some(DateTime::from_chrono(end));
        self.updated_at = DateTime::from_chrono(now);
    }

    /// Mark the current period settled. Invoked by payment completion.
    pub fn mark_paid(&mut self) {
        self.payment_status = SubscriptionPaymentStatus::Paid;
        self.updated_at = DateTime::now();
    }

    /// Advisory ceiling check for course creation.
    pub fn can_create_course(&self) -> bool {
        self.features.max_courses == UNLIMITED
            || self.usage.courses_created < self.features.max_courses
    }

    /// Advisory ceiling check for enrolling `count` more students.
    pub fn can_enroll_students(&self, count: i64) -> bool {
        self.features.max_students == UNLIMITED
            || self.usage.students_enrolled + count <= self.features.max_students
    }
}
