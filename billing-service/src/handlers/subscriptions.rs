//! Subscription lifecycle handlers.
//!
//! All operations are scoped to the calling account from the request context.

use axum::{extract::State, http::StatusCode, Json};
use mongodb::bson::DateTime;
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{
        CancelSubscriptionRequest, CreateSubscriptionRequest, SubscriptionResponse,
        UpgradeSubscriptionRequest,
    },
    middleware::AccountContext,
    models::{BillingCycle, Payment, PlanTier, Subscription},
    AppState,
};

/// Create a subscription for the calling account.
///
/// Paid tiers start in trial with the first charge pending, due when the
/// trial ends. An account with a current (trial/active) subscription gets a
/// conflict; the partial unique index backstops the precheck under races.
pub async fn create_subscription(
    State(state): State<AppState>,
    account: AccountContext,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), AppError> {
    payload.validate()?;
    let plan = PlanTier::from_string(&payload.plan);
    let billing_cycle = BillingCycle::from_string(&payload.billing_cycle);

    if let Some(existing) = state
        .repository
        .find_current_subscription(account.account_id)
        .await?
    {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "account already has a {} subscription",
            existing.status.as_str()
        )));
    }

    let subscription = Subscription::new(account.account_id, plan, billing_cycle);

    tracing::info!(
        subscription_id = %subscription.id,
        account_id = %account.account_id,
        plan = %plan,
        billing_cycle = %billing_cycle,
        amount = subscription.amount,
        "Creating subscription"
    );

    state.repository.insert_subscription(&subscription).await?;

    if subscription.amount > 0 {
        // First charge: due at trial end, covering the post-trial period.
        let due = subscription.trial_end_date.unwrap_or(subscription.end_date);
        let period_end = DateTime::from_chrono(
            due.to_chrono() + chrono::Duration::days(billing_cycle.period_days()),
        );
        let mut payment = Payment::new(
            account.account_id,
            &subscription,
            None,
            subscription.amount,
            due,
            due,
            period_end,
        );
        state.repository.insert_payment(&mut payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            subscription_id = %subscription.id,
            amount = payment.amount,
            "Created pending payment for new subscription"
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(subscription)),
    ))
}

/// Upgrade the account's current subscription to a higher tier.
///
/// Charges the full new-tier price with no proration; remaining time on the
/// old plan is discarded.
pub async fn upgrade_subscription(
    State(state): State<AppState>,
    account: AccountContext,
    Json(payload): Json<UpgradeSubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    payload.validate()?;
    let plan = PlanTier::from_string(&payload.plan);
    let billing_cycle = BillingCycle::from_string(&payload.billing_cycle);

    let mut subscription = state
        .repository
        .find_current_subscription(account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active subscription")))?;

    subscription
        .upgrade_to(plan, billing_cycle)
        .map_err(|e| AppError::InvalidTransition(anyhow::Error::new(e)))?;

    tracing::info!(
        subscription_id = %subscription.id,
        account_id = %account.account_id,
        plan = %plan,
        billing_cycle = %billing_cycle,
        amount = subscription.amount,
        "Upgrading subscription"
    );

    state.repository.update_subscription(&subscription).await?;

    // New-tier charge is due immediately, covering the restarted term.
    let now = DateTime::now();
    let mut payment = Payment::new(
        account.account_id,
        &subscription,
        None,
        subscription.amount,
        now,
        now,
        subscription.end_date,
    );
    state.repository.insert_payment(&mut payment).await?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// Cancel the account's current subscription.
pub async fn cancel_subscription(
    State(state): State<AppState>,
    account: AccountContext,
    Json(payload): Json<CancelSubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    payload.validate()?;

    let mut subscription = state
        .repository
        .find_current_subscription(account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active subscription")))?;

    subscription.cancel(payload.reason);

    tracing::info!(
        subscription_id = %subscription.id,
        account_id = %account.account_id,
        "Cancelling subscription"
    );

    state.repository.update_subscription(&subscription).await?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// Restart the billing term of the account's current subscription from now.
pub async fn renew_subscription(
    State(state): State<AppState>,
    account: AccountContext,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let mut subscription = state
        .repository
        .find_current_subscription(account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active subscription")))?;

    subscription.renew();

    tracing::info!(
        subscription_id = %subscription.id,
        account_id = %account.account_id,
        end_date = %subscription.end_date,
        "Renewing subscription"
    );

    state.repository.update_subscription(&subscription).await?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// Fetch the account's current subscription.
pub async fn get_current_subscription(
    State(state): State<AppState>,
    account: AccountContext,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let subscription = state
        .repository
        .find_current_subscription(account.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active subscription")))?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}
