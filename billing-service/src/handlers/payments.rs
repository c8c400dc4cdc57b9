//! Payment handlers.
//!
//! Completing a payment renews the owning subscription as a second, sequential
//! write from the same handler. If the renewal write fails the payment stays
//! completed; there is no compensating rollback (see DESIGN.md).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::DateTime;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        CompletePaymentRequest, CreatePaymentRequest, FailPaymentRequest, ListPaymentsQuery,
        PaymentResponse, RefundPaymentRequest,
    },
    middleware::AccountContext,
    models::{Payment, PaymentMethod},
    AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// Initiate a payment against one of the caller's subscriptions.
pub async fn create_payment(
    State(state): State<AppState>,
    account: AccountContext,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    payload.validate()?;
    let method = PaymentMethod::from_string(&payload.method);

    let subscription = state
        .repository
        .get_subscription_for_account(payload.subscription_id, account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))?;

    let now = DateTime::now();
    let mut payment = Payment::new(
        account.account_id,
        &subscription,
        Some(method),
        payload.amount,
        now,
        now,
        subscription.end_date,
    );

    tracing::info!(
        payment_id = %payment.id,
        subscription_id = %subscription.id,
        account_id = %account.account_id,
        amount = payment.amount,
        "Creating payment"
    );

    state.repository.insert_payment(&mut payment).await?;

    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

/// Complete a pending payment and extend the owning subscription.
///
/// The term restarts from the moment of completion; a late payment does not
/// stack onto unused time.
pub async fn complete_payment(
    State(state): State<AppState>,
    account: AccountContext,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<CompletePaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let mut payment = state
        .repository
        .get_payment_for_account(payment_id, account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    payment
        .complete(payload.gateway_txn_id, payload.gateway_response)
        .map_err(|e| AppError::InvalidTransition(anyhow::Error::new(e)))?;

    state.repository.update_payment(&mut payment).await?;

    tracing::info!(
        payment_id = %payment.id,
        subscription_id = %payment.subscription_id,
        account_id = %account.account_id,
        "Payment completed"
    );

    // Second write of the completion pair: renew the owning subscription.
    match state
        .repository
        .get_subscription_for_account(payment.subscription_id, account.account_id)
        .await?
    {
        Some(mut subscription) => {
            subscription.renew();
            subscription.mark_paid();
            state.repository.update_subscription(&subscription).await?;
            tracing::info!(
                subscription_id = %subscription.id,
                end_date = %subscription.end_date,
                "Subscription renewed by payment completion"
            );
        }
        None => {
            tracing::warn!(
                payment_id = %payment.id,
                subscription_id = %payment.subscription_id,
                "Completed payment references a missing subscription"
            );
        }
    }

    Ok(Json(PaymentResponse::from(payment)))
}

/// Record a failed charge. The owning subscription is not suspended here.
pub async fn fail_payment(
    State(state): State<AppState>,
    account: AccountContext,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<FailPaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    payload.validate()?;

    let mut payment = state
        .repository
        .get_payment_for_account(payment_id, account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    payment
        .fail(payload.reason)
        .map_err(|e| AppError::InvalidTransition(anyhow::Error::new(e)))?;

    tracing::info!(
        payment_id = %payment.id,
        account_id = %account.account_id,
        "Payment failed"
    );

    state.repository.update_payment(&mut payment).await?;

    Ok(Json(PaymentResponse::from(payment)))
}

/// Refund a completed payment. The subscription's extended end date is left
/// as is; refunds and subscription dates are decoupled.
pub async fn refund_payment(
    State(state): State<AppState>,
    account: AccountContext,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<RefundPaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    payload.validate()?;

    let mut payment = state
        .repository
        .get_payment_for_account(payment_id, account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    payment
        .refund(payload.amount, payload.reason)
        .map_err(|e| AppError::InvalidTransition(anyhow::Error::new(e)))?;

    tracing::info!(
        payment_id = %payment.id,
        account_id = %account.account_id,
        refund_amount = ?payment.refund_amount,
        "Payment refunded"
    );

    state.repository.update_payment(&mut payment).await?;

    Ok(Json(PaymentResponse::from(payment)))
}

/// Fetch one of the caller's payments.
pub async fn get_payment(
    State(state): State<AppState>,
    account: AccountContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state
        .repository
        .get_payment_for_account(payment_id, account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    Ok(Json(PaymentResponse::from(payment)))
}

/// List the caller's payments, newest first.
pub async fn list_payments(
    State(state): State<AppState>,
    account: AccountContext,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let payments = state
        .repository
        .list_payments_for_account(account.account_id, limit, offset)
        .await?;

    Ok(Json(
        payments.into_iter().map(PaymentResponse::from).collect(),
    ))
}
