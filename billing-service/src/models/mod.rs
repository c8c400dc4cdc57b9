pub mod payment;
pub mod plan;
pub mod subscription;

pub use payment::{Payment, PaymentError, PaymentMethod, PaymentStatus};
pub use plan::{plan_features, plan_price, BillingCycle, FeatureSet, PlanTier, CURRENCY, UNLIMITED};
pub use subscription::{
    Subscription, SubscriptionError, SubscriptionPaymentStatus, SubscriptionStatus, UsageCounters,
    UsageKind, TRIAL_DAYS,
};
