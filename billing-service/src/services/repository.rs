//! MongoDB persistence for subscriptions and payments.
//!
//! Storage-level invariants live here: the partial unique index that backs the
//! one-current-subscription-per-account rule, the sparse unique indexes on
//! invoice/receipt numbers, and the atomic ceiling-guarded usage increment.

use anyhow::anyhow;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::payment::{generate_invoice_number, generate_receipt_number};
use crate::models::{Payment, Subscription, UsageKind, UNLIMITED};

/// Attempts allowed when an invoice/receipt number collides.
const NUMBERING_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct BillingRepository {
    subscriptions: Collection<Subscription>,
    payments: Collection<Payment>,
}

impl BillingRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            subscriptions: db.collection("subscriptions"),
            payments: db.collection("payments"),
        }
    }

    /// Initialize indexes.
    pub async fn init_indexes(&self) -> Result<(), AppError> {
        // Partial unique index: at most one trial/active subscription per account.
        // The insert itself fails on violation and is translated to Conflict.
        let current_subscription_index = IndexModel::builder()
            .keys(doc! { "account_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("current_subscription_idx".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! {
                        "status": { "$in": ["trial", "active"] }
                    })
                    .build(),
            )
            .build();

        let account_status_index = IndexModel::builder()
            .keys(doc! { "account_id": 1, "status": 1 })
            .options(
                IndexOptions::builder()
                    .name("account_status_idx".to_string())
                    .build(),
            )
            .build();

        self.subscriptions
            .create_indexes([current_subscription_index, account_status_index], None)
            .await?;

        let invoice_index = IndexModel::builder()
            .keys(doc! { "invoice_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_number_idx".to_string())
                    .unique(true)
                    .sparse(true)
                    .build(),
            )
            .build();

        let receipt_index = IndexModel::builder()
            .keys(doc! { "receipt_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("receipt_number_idx".to_string())
                    .unique(true)
                    .sparse(true)
                    .build(),
            )
            .build();

        let account_payments_index = IndexModel::builder()
            .keys(doc! { "account_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("account_payments_idx".to_string())
                    .build(),
            )
            .build();

        let subscription_payments_index = IndexModel::builder()
            .keys(doc! { "subscription_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("subscription_payments_idx".to_string())
                    .build(),
            )
            .build();

        self.payments
            .create_indexes(
                [
                    invoice_index,
                    receipt_index,
                    account_payments_index,
                    subscription_payments_index,
                ],
                None,
            )
            .await?;

        tracing::info!("Billing service indexes initialized");
        Ok(())
    }

    /// Find the account's current (trial or active) subscription.
    pub async fn find_current_subscription(
        &self,
        account_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let filter = doc! {
            "account_id": account_id.to_string(),
            "status": { "$in": ["trial", "active"] }
        };
        let subscription = self.subscriptions.find_one(filter, None).await?;
        Ok(subscription)
    }

    /// Insert a subscription. A duplicate-key violation of the partial unique
    /// index means the account already holds a current subscription.
    pub async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        self.subscriptions
            .insert_one(subscription, None)
            .await
            .map_err(current_subscription_conflict)?;
        Ok(())
    }

    pub async fn update_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        let filter = doc! { "_id": subscription.id.to_string() };
        self.subscriptions
            .replace_one(filter, subscription, None)
            .await?;
        Ok(())
    }

    pub async fn get_subscription_for_account(
        &self,
        id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let filter = doc! {
            "_id": id.to_string(),
            "account_id": account_id.to_string()
        };
        let subscription = self.subscriptions.find_one(filter, None).await?;
        Ok(subscription)
    }

    /// Ceiling-guarded usage increment, in one write.
    ///
    /// The filter admits the update only when the kind is unmetered for the
    /// plan or `counter + delta` stays within the snapshot ceiling. Returns the
    /// updated subscription, or `None` when the ceiling blocked the increment.
    pub async fn record_usage(
        &self,
        subscription_id: Uuid,
        kind: UsageKind,
        delta: i64,
    ) -> Result<Option<Subscription>, AppError> {
        let mut filter = doc! { "_id": subscription_id.to_string() };
        if let Some(ceiling_field) = kind.ceiling_field() {
            let counter_path = format!("${}", kind.counter_field());
            let ceiling_path = format!("${}", ceiling_field);
            filter.insert(
                "$or",
                vec![
                    doc! { ceiling_field: UNLIMITED },
                    doc! { "$expr": { "$lte": [ { "$add": [counter_path, delta] }, ceiling_path ] } },
                ],
            );
        }

        let update = doc! {
            "$inc": { kind.counter_field(): delta },
            "$currentDate": { "updated_at": true }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .subscriptions
            .find_one_and_update(filter, update, options)
            .await?;
        Ok(updated)
    }

    /// Decrement a usage counter, never below zero. A single pipeline write so
    /// the floor cannot race a concurrent increment.
    pub async fn release_usage(
        &self,
        subscription_id: Uuid,
        kind: UsageKind,
        delta: i64,
    ) -> Result<Option<Subscription>, AppError> {
        let filter = doc! { "_id": subscription_id.to_string() };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .subscriptions
            .find_one_and_update(filter, release_usage_pipeline(kind, delta), options)
            .await?;
        Ok(updated)
    }

    /// Insert a payment, regenerating the invoice number on a unique-index
    /// collision (bounded attempts).
    pub async fn insert_payment(&self, payment: &mut Payment) -> Result<(), AppError> {
        let mut attempt = 1;
        loop {
            match self.payments.insert_one(&*payment, None).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    numbering_attempt_outcome(err, attempt, "invoice number")?;
                    tracing::warn!(
                        payment_id = %payment.id,
                        attempt,
                        "Invoice number collision, regenerating"
                    );
                    payment.invoice_number = Some(generate_invoice_number());
                    if payment.receipt_number.is_some() {
                        payment.receipt_number = Some(generate_receipt_number());
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Persist a payment update, regenerating the receipt number on a
    /// unique-index collision (the invoice number is already persisted).
    pub async fn update_payment(&self, payment: &mut Payment) -> Result<(), AppError> {
        let filter = doc! { "_id": payment.id.to_string() };
        let mut attempt = 1;
        loop {
            match self
                .payments
                .replace_one(filter.clone(), &*payment, None)
                .await
            {
                Ok(_) => return Ok(()),
                Err(err) => {
                    numbering_attempt_outcome(err, attempt, "receipt number")?;
                    tracing::warn!(
                        payment_id = %payment.id,
                        attempt,
                        "Receipt number collision, regenerating"
                    );
                    payment.receipt_number = Some(generate_receipt_number());
                    attempt += 1;
                }
            }
        }
    }

    pub async fn get_payment_for_account(
        &self,
        id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        let filter = doc! {
            "_id": id.to_string(),
            "account_id": account_id.to_string()
        };
        let payment = self.payments.find_one(filter, None).await?;
        Ok(payment)
    }

    /// List the account's payments, newest first.
    pub async fn list_payments_for_account(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Payment>, AppError> {
        let filter = doc! { "account_id": account_id.to_string() };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(offset)
            .limit(limit)
            .build();
        let cursor = self.payments.find(filter, options).await?;
        let payments: Vec<Payment> = cursor.try_collect().await?;
        Ok(payments)
    }
}

/// Translate a violation of the partial unique index into the domain conflict.
fn current_subscription_conflict(err: mongodb::error::Error) -> AppError {
    if is_duplicate_key(&err) {
        AppError::Conflict(anyhow!(
            "account already has an active or trial subscription"
        ))
    } else {
        err.into()
    }
}

/// Decide whether a failed payment write warrants another numbering attempt.
///
/// `Ok(())` means the caller should regenerate the colliding number and retry.
/// A duplicate key on the final attempt becomes an internal error; anything
/// else surfaces as the storage error it is.
fn numbering_attempt_outcome(
    err: mongodb::error::Error,
    attempt: usize,
    what: &str,
) -> Result<(), AppError> {
    if !is_duplicate_key(&err) {
        return Err(err.into());
    }
    if attempt >= NUMBERING_ATTEMPTS {
        return Err(AppError::InternalError(anyhow!(
            "could not allocate a unique {what} after {NUMBERING_ATTEMPTS} attempts"
        )));
    }
    Ok(())
}

/// Pipeline update flooring the counter at zero while stamping `updated_at`.
fn release_usage_pipeline(kind: UsageKind, delta: i64) -> Vec<Document> {
    let counter_path = format!("${}", kind.counter_field());
    vec![doc! {
        "$set": {
            kind.counter_field(): { "$max": [0i64, { "$subtract": [counter_path, delta] }] },
            "updated_at": "$$NOW"
        }
    }]
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        ErrorKind::BulkWrite(bulk) => bulk
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|e| e.code == 11000))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;
    use mongodb::error::{CommandError, Error, WriteError};

    // The driver's error structs are deserialized from server replies, so the
    // tests build them the same way.
    fn write_error(code: i32) -> Error {
        let write_error: WriteError = mongodb::bson::from_document(doc! {
            "code": code,
            "errmsg": "duplicate key error",
            "message": "duplicate key error",
        })
        .expect("write error document");
        Error::from(ErrorKind::Write(WriteFailure::WriteError(write_error)))
    }

    fn command_error(code: i32) -> Error {
        let command_error: CommandError = mongodb::bson::from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "code_name": "DuplicateKey",
            "errmsg": "duplicate key error",
            "message": "duplicate key error",
        })
        .expect("command error document");
        Error::from(ErrorKind::Command(command_error))
    }

    #[test]
    fn duplicate_key_codes_are_recognized() {
        assert!(is_duplicate_key(&write_error(11000)));
        assert!(is_duplicate_key(&command_error(11000)));
        assert!(!is_duplicate_key(&write_error(121)));
        assert!(!is_duplicate_key(&command_error(50)));
    }

    #[test]
    fn unique_index_violation_on_insert_becomes_conflict() {
        let err = current_subscription_conflict(write_error(11000));
        assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");
    }

    #[test]
    fn other_insert_errors_stay_storage_errors() {
        let err = current_subscription_conflict(write_error(121));
        assert!(matches!(err, AppError::DatabaseError(_)), "got {err:?}");
    }

    #[test]
    fn numbering_collisions_retry_until_the_last_attempt() {
        for attempt in 1..NUMBERING_ATTEMPTS {
            assert!(
                numbering_attempt_outcome(write_error(11000), attempt, "invoice number").is_ok(),
                "attempt {attempt} should retry"
            );
        }
    }

    #[test]
    fn numbering_collision_on_the_last_attempt_is_an_internal_error() {
        let outcome =
            numbering_attempt_outcome(write_error(11000), NUMBERING_ATTEMPTS, "invoice number");
        assert!(
            matches!(outcome, Err(AppError::InternalError(_))),
            "got {outcome:?}"
        );
    }

    #[test]
    fn non_duplicate_write_errors_abort_the_numbering_retry() {
        let outcome = numbering_attempt_outcome(write_error(121), 1, "receipt number");
        assert!(
            matches!(outcome, Err(AppError::DatabaseError(_))),
            "got {outcome:?}"
        );
    }

    #[test]
    fn release_pipeline_floors_the_counter_at_zero() {
        let pipeline = release_usage_pipeline(UsageKind::Course, 2);
        assert_eq!(pipeline.len(), 1);

        let set = pipeline[0].get_document("$set").expect("$set stage");
        let expr = set
            .get_document("usage.courses_created")
            .expect("counter expression");
        let max = expr.get_array("$max").expect("$max operands");
        assert_eq!(max[0], Bson::Int64(0));

        let subtract = max[1]
            .as_document()
            .and_then(|d| d.get_array("$subtract").ok())
            .expect("$subtract operands");
        assert_eq!(subtract[0], Bson::String("$usage.courses_created".into()));
        assert_eq!(subtract[1], Bson::Int64(2));

        assert_eq!(set.get_str("updated_at").unwrap(), "$$NOW");
    }
}
