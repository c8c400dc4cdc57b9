//! Payment model and its state transitions.
//!
//! Invoice numbers are assigned at first insert, receipt numbers when a
//! payment completes. Uniqueness is enforced by sparse unique indexes; the
//! repository retries with a fresh suffix on collision.

use mongodb::bson::DateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::plan::{BillingCycle, PlanTier};
use crate::models::subscription::Subscription;

/// Payment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    KakaoPay,
    NaverPay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::KakaoPay => "kakao_pay",
            PaymentMethod::NaverPay => "naver_pay",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "bank_transfer" => PaymentMethod::BankTransfer,
            "kakao_pay" => PaymentMethod::KakaoPay,
            "naver_pay" => PaymentMethod::NaverPay,
            _ => PaymentMethod::Card,
        }
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment is {status}, only pending or processing payments can be completed")]
    NotCompletable { status: PaymentStatus },

    #[error("payment is {status}, only pending or processing payments can be failed")]
    NotFailable { status: PaymentStatus },

    #[error("payment is {status}, only completed payments can be refunded")]
    NotRefundable { status: PaymentStatus },

    #[error("refund amount {requested} must be between 1 and the charged amount {charged}")]
    InvalidRefundAmount { requested: i64, charged: i64 },
}

/// One attempted or completed charge against a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub account_id: Uuid,
    pub subscription_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub gateway_txn_id: Option<String>,
    pub gateway_response: Option<String>,
    pub billing_period_start: DateTime,
    pub billing_period_end: DateTime,
    pub plan: PlanTier,
    pub billing_cycle: BillingCycle,
    pub due_date: DateTime,
    pub paid_date: Option<DateTime>,
    pub failure_reason: Option<String>,
    pub refund_amount: Option<i64>,
    pub refund_reason: Option<String>,
    pub refund_date: Option<DateTime>,
    pub invoice_number: Option<String>,
    pub receipt_number: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Payment {
    /// Create a `pending` payment against a subscription, with the plan and
    /// cycle snapshotted and an invoice number already assigned.
    pub fn new(
        account_id: Uuid,
        subscription: &Subscription,
        method: Option<PaymentMethod>,
        amount: i64,
        due_date: DateTime,
        billing_period_start: DateTime,
        billing_period_end: DateTime,
    ) -> Self {
        let now = DateTime::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            subscription_id: subscription.id,
            amount,
            currency: subscription.currency.clone(),
            status: PaymentStatus::Pending,
            method,
            gateway_txn_id: None,
            gateway_response: None,
            billing_period_start,
            billing_period_end,
            plan: subscription.plan,
            billing_cycle: subscription.billing_cycle,
            due_date,
            paid_date: None,
            failure_reason: None,
            refund_amount: None,
            refund_reason: None,
            refund_date: None,
            invoice_number: Some(generate_invoice_number()),
            receipt_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the payment completed, recording gateway fields and assigning the
    /// receipt number. Only `pending` or `processing` payments can complete;
    /// the caller renews the owning subscription afterwards.
    pub fn complete(
        &mut self,
        gateway_txn_id: Option<String>,
        gateway_response: Option<String>,
    ) -> Result<(), PaymentError> {
        if !matches!(
            self.status,
            PaymentStatus::Pending | PaymentStatus::Processing
        ) {
            return Err(PaymentError::NotCompletable {
                status: self.status,
            });
        }

        let now = DateTime::now();
        self.status = PaymentStatus::Completed;
        self.paid_date = Some(now);
        self.gateway_txn_id = gateway_txn_id;
        self.gateway_response = gateway_response;
        if self.receipt_number.is_none() {
            self.receipt_number = Some(generate_receipt_number());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Mark the payment failed. The owning subscription is left untouched.
    pub fn fail(&mut self, reason: String) -> Result<(), PaymentError> {
        if !matches!(
            self.status,
            PaymentStatus::Pending | PaymentStatus::Processing
        ) {
            return Err(PaymentError::NotFailable {
                status: self.status,
            });
        }

        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason);
        self.updated_at = DateTime::now();
        Ok(())
    }

    /// Refund a completed payment. Defaults to the full charged amount. The
    /// subscription's extended end date is deliberately not reversed.
    pub fn refund(
        &mut self,
        amount: Option<i64>,
        reason: Option<String>,
    ) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Completed {
            return Err(PaymentError::NotRefundable {
                status: self.status,
            });
        }

        let refund_amount = amount.unwrap_or(self.amount);
        if refund_amount < 1 || refund_amount > self.amount {
            return Err(PaymentError::InvalidRefundAmount {
                requested: refund_amount,
                charged: self.amount,
            });
        }

        let now = DateTime::now();
        self.status = PaymentStatus::Refunded;
        self.refund_amount = Some(refund_amount);
        self.refund_reason = reason;
        self.refund_date = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

/// `INV-{YYYY}{MM}-{4 random digits}`.
pub fn generate_invoice_number() -> String {
    generate_document_number("INV")
}

/// `RCP-{YYYY}{MM}-{4 random digits}`.
pub fn generate_receipt_number() -> String {
    generate_document_number("RCP")
}

fn generate_document_number(prefix: &str) -> String {
    use chrono::Datelike;
    let now = chrono::Utc::now();
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("{}-{}{:02}-{:04}", prefix, now.year(), now.month(), suffix)
}
