//! Request/response shapes for the HTTP surface.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{FeatureSet, Payment, Subscription, UsageCounters};

fn validate_plan(value: &str) -> Result<(), ValidationError> {
    match value {
        "starter" | "pro" | "premium" => Ok(()),
        _ => Err(ValidationError::new("invalid_plan")),
    }
}

fn validate_billing_cycle(value: &str) -> Result<(), ValidationError> {
    match value {
        "monthly" | "yearly" => Ok(()),
        _ => Err(ValidationError::new("invalid_billing_cycle")),
    }
}

fn validate_payment_method(value: &str) -> Result<(), ValidationError> {
    match value {
        "card" | "bank_transfer" | "kakao_pay" | "naver_pay" => Ok(()),
        _ => Err(ValidationError::new("invalid_payment_method")),
    }
}

fn validate_usage_kind(value: &str) -> Result<(), ValidationError> {
    match value {
        "course" | "student" | "api" => Ok(()),
        _ => Err(ValidationError::new("invalid_usage_kind")),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    #[validate(custom(function = "validate_plan"))]
    pub plan: String,
    #[validate(custom(function = "validate_billing_cycle"))]
    pub billing_cycle: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpgradeSubscriptionRequest {
    #[validate(custom(function = "validate_plan"))]
    pub plan: String,
    #[validate(custom(function = "validate_billing_cycle"))]
    pub billing_cycle: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelSubscriptionRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub subscription_id: Uuid,
    #[validate(custom(function = "validate_payment_method"))]
    pub method: String,
    #[validate(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CompletePaymentRequest {
    pub gateway_txn_id: Option<String>,
    pub gateway_response: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FailPaymentRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundPaymentRequest {
    #[validate(range(min = 1))]
    pub amount: Option<i64>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordUsageRequest {
    #[validate(custom(function = "validate_usage_kind"))]
    pub kind: String,
    #[validate(range(min = 1))]
    pub delta: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub enroll_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

fn to_rfc3339(dt: DateTime) -> String {
    dt.to_chrono().to_rfc3339()
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub plan: String,
    pub billing_cycle: String,
    pub status: String,
    pub payment_status: String,
    pub start_date: String,
    pub end_date: String,
    pub next_billing_date: Option<String>,
    pub trial_end_date: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub auto_renew: bool,
    pub features: FeatureSet,
    pub usage: UsageCounters,
    pub cancelled_at: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            plan: s.plan.as_str().to_string(),
            billing_cycle: s.billing_cycle.as_str().to_string(),
            status: s.status.as_str().to_string(),
            payment_status: s.payment_status.as_str().to_string(),
            start_date: to_rfc3339(s.start_date),
            end_date: to_rfc3339(s.end_date),
            next_billing_date: s.next_billing_date.map(to_rfc3339),
            trial_end_date: s.trial_end_date.map(to_rfc3339),
            amount: s.amount,
            currency: s.currency,
            auto_renew: s.auto_renew,
            features: s.features,
            usage: s.usage,
            cancelled_at: s.cancelled_at.map(to_rfc3339),
            cancellation_reason: s.cancellation_reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub method: Option<String>,
    pub gateway_txn_id: Option<String>,
    pub billing_period_start: String,
    pub billing_period_end: String,
    pub plan: String,
    pub billing_cycle: String,
    pub due_date: String,
    pub paid_date: Option<String>,
    pub failure_reason: Option<String>,
    pub refund_amount: Option<i64>,
    pub refund_reason: Option<String>,
    pub refund_date: Option<String>,
    pub invoice_number: Option<String>,
    pub receipt_number: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            subscription_id: p.subscription_id,
            amount: p.amount,
            currency: p.currency,
            status: p.status.as_str().to_string(),
            method: p.method.map(|m| m.as_str().to_string()),
            gateway_txn_id: p.gateway_txn_id,
            billing_period_start: to_rfc3339(p.billing_period_start),
            billing_period_end: to_rfc3339(p.billing_period_end),
            plan: p.plan.as_str().to_string(),
            billing_cycle: p.billing_cycle.as_str().to_string(),
            due_date: to_rfc3339(p.due_date),
            paid_date: p.paid_date.map(to_rfc3339),
            failure_reason: p.failure_reason,
            refund_amount: p.refund_amount,
            refund_reason: p.refund_reason,
            refund_date: p.refund_date.map(to_rfc3339),
            invoice_number: p.invoice_number,
            receipt_number: p.receipt_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub subscription_id: Uuid,
    pub plan: String,
    pub usage: UsageCounters,
    pub features: FeatureSet,
    pub can_create_course: bool,
    pub can_enroll_students: bool,
}

impl UsageResponse {
    pub fn for_subscription(subscription: &Subscription, enroll_count: i64) -> Self {
        Self {
            subscription_id: subscription.id,
            plan: subscription.plan.as_str().to_string(),
            usage: subscription.usage,
            features: subscription.features,
            can_create_course: subscription.can_create_course(),
            can_enroll_students: subscription.can_enroll_students(enroll_count),
        }
    }
}
