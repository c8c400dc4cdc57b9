//! Usage counter handlers.
//!
//! Recording usage is a single ceiling-guarded write; the advisory predicates
//! on the usage report exist for callers that want to surface limits before
//! attempting a mutation.

use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{RecordUsageRequest, UsageQuery, UsageResponse},
    middleware::AccountContext,
    models::UsageKind,
    AppState,
};

/// Report the caller's usage, ceilings and ceiling predicates.
pub async fn get_usage(
    State(state): State<AppState>,
    account: AccountContext,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageResponse>, AppError> {
    let subscription = state
        .repository
        .find_current_subscription(account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active subscription")))?;

    let enroll_count = query.enroll_count.unwrap_or(1).max(1);
    Ok(Json(UsageResponse::for_subscription(
        &subscription,
        enroll_count,
    )))
}

/// Increment a usage counter, atomically rejecting increments that would
/// exceed the plan's snapshot ceiling.
pub async fn record_usage(
    State(state): State<AppState>,
    account: AccountContext,
    Json(payload): Json<RecordUsageRequest>,
) -> Result<Json<UsageResponse>, AppError> {
    payload.validate()?;
    let kind = UsageKind::from_string(&payload.kind);
    let delta = payload.delta.unwrap_or(1);

    let subscription = state
        .repository
        .find_current_subscription(account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active subscription")))?;

    match state
        .repository
        .record_usage(subscription.id, kind, delta)
        .await?
    {
        Some(updated) => {
            tracing::info!(
                subscription_id = %updated.id,
                account_id = %account.account_id,
                kind = %kind,
                delta,
                "Recorded usage"
            );
            Ok(Json(UsageResponse::for_subscription(&updated, 1)))
        }
        None => Err(AppError::Conflict(anyhow::anyhow!(
            "{} ceiling reached for the {} plan",
            kind,
            subscription.plan
        ))),
    }
}

/// Decrement a usage counter when a course is deleted or a student unenrolls.
/// Counters never go below zero.
pub async fn release_usage(
    State(state): State<AppState>,
    account: AccountContext,
    Json(payload): Json<RecordUsageRequest>,
) -> Result<Json<UsageResponse>, AppError> {
    payload.validate()?;
    let kind = UsageKind::from_string(&payload.kind);
    let delta = payload.delta.unwrap_or(1);

    let subscription = state
        .repository
        .find_current_subscription(account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active subscription")))?;

    let updated = state
        .repository
        .release_usage(subscription.id, kind, delta)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active subscription")))?;

    tracing::info!(
        subscription_id = %updated.id,
        account_id = %account.account_id,
        kind = %kind,
        delta,
        "Released usage"
    );

    Ok(Json(UsageResponse::for_subscription(&updated, 1)))
}
