//! Plan catalog: per-tier feature ceilings and pricing.
//!
//! The catalog is a pure lookup. Subscriptions copy the feature set at
//! creation/upgrade time; later catalog changes never touch existing rows.

use serde::{Deserialize, Serialize};

/// All plan prices are whole KRW (no minor unit).
pub const CURRENCY: &str = "KRW";

/// Sentinel for "no ceiling" on a metered resource.
pub const UNLIMITED: i64 = -1;

/// Plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Pro,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Starter => "starter",
            PlanTier::Pro => "pro",
            PlanTier::Premium => "premium",
        }
    }

    /// Unknown tiers fall back to the starter defaults.
    pub fn from_string(s: &str) -> Self {
        match s {
            "pro" => PlanTier::Pro,
            "premium" => PlanTier::Premium,
            _ => PlanTier::Starter,
        }
    }

    /// Rank used for upgrade ordering: starter(1) < pro(2) < premium(3).
    pub fn rank(&self) -> u8 {
        match self {
            PlanTier::Starter => 1,
            PlanTier::Pro => 2,
            PlanTier::Premium => 3,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "yearly" => BillingCycle::Yearly,
            _ => BillingCycle::Monthly,
        }
    }

    /// Length of one billing period in days.
    pub fn period_days(&self) -> i64 {
        match self {
            BillingCycle::Monthly => 30,
            BillingCycle::Yearly => 365,
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability snapshot copied onto a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub max_courses: i64,
    pub max_students: i64,
    pub custom_branding: bool,
    pub api_access: bool,
    pub white_label: bool,
    pub priority_support: bool,
    pub sso_integration: bool,
    pub custom_domain: bool,
    pub dedicated_manager: bool,
}

/// Feature ceilings and capability flags for a tier.
pub fn plan_features(tier: PlanTier) -> FeatureSet {
    match tier {
        PlanTier::Starter => FeatureSet {
            max_courses: 5,
            max_students: 50,
            custom_branding: false,
            api_access: false,
            white_label: false,
            priority_support: false,
            sso_integration: false,
            custom_domain: false,
            dedicated_manager: false,
        },
        PlanTier::Pro => FeatureSet {
            max_courses: UNLIMITED,
            max_students: 500,
            custom_branding: true,
            api_access: true,
            white_label: false,
            priority_support: false,
            sso_integration: false,
            custom_domain: false,
            dedicated_manager: false,
        },
        PlanTier::Premium => FeatureSet {
            max_courses: UNLIMITED,
            max_students: UNLIMITED,
            custom_branding: true,
            api_access: true,
            white_label: true,
            priority_support: true,
            sso_integration: true,
            custom_domain: true,
            dedicated_manager: true,
        },
    }
}

/// Price in KRW for one billing period of the tier.
pub fn plan_price(tier: PlanTier, cycle: BillingCycle) -> i64 {
    match (tier, cycle) {
        (PlanTier::Starter, _) => 0,
        (PlanTier::Pro, BillingCycle::Monthly) => 15_000,
        (PlanTier::Pro, BillingCycle::Yearly) => 150_000,
        (PlanTier::Premium, BillingCycle::Monthly) => 29_000,
        (PlanTier::Premium, BillingCycle::Yearly) => 290_000,
    }
}
