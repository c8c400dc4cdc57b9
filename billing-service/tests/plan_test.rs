//! Plan catalog tests: pricing, feature ceilings, and parse fallbacks.

use billing_service::models::{
    plan_features, plan_price, BillingCycle, PlanTier, CURRENCY, UNLIMITED,
};

#[test]
fn plan_price_is_total_over_all_tiers_and_cycles() {
    for tier in [PlanTier::Starter, PlanTier::Pro, PlanTier::Premium] {
        for cycle in [BillingCycle::Monthly, BillingCycle::Yearly] {
            let price = plan_price(tier, cycle);
            assert!(price >= 0, "{tier}/{cycle} has a negative price");
        }
    }
}

#[test]
fn starter_is_free_on_both_cycles() {
    assert_eq!(plan_price(PlanTier::Starter, BillingCycle::Monthly), 0);
    assert_eq!(plan_price(PlanTier::Starter, BillingCycle::Yearly), 0);
}

#[test]
fn pro_monthly_price_is_15000_krw() {
    assert_eq!(plan_price(PlanTier::Pro, BillingCycle::Monthly), 15_000);
    assert_eq!(CURRENCY, "KRW");
}

#[test]
fn yearly_prices_are_ten_months_worth() {
    assert_eq!(plan_price(PlanTier::Pro, BillingCycle::Yearly), 150_000);
    assert_eq!(plan_price(PlanTier::Premium, BillingCycle::Yearly), 290_000);
}

#[test]
fn starter_features_are_bounded() {
    let features = plan_features(PlanTier::Starter);
    assert_eq!(features.max_courses, 5);
    assert_eq!(features.max_students, 50);
    assert!(!features.custom_branding);
    assert!(!features.api_access);
    assert!(!features.dedicated_manager);
}

#[test]
fn pro_has_unlimited_courses_but_bounded_students() {
    let features = plan_features(PlanTier::Pro);
    assert_eq!(features.max_courses, UNLIMITED);
    assert_eq!(features.max_students, 500);
    assert!(features.custom_branding);
    assert!(features.api_access);
    assert!(!features.white_label);
}

#[test]
fn premium_is_unbounded_with_all_flags() {
    let features = plan_features(PlanTier::Premium);
    assert_eq!(features.max_courses, UNLIMITED);
    assert_eq!(features.max_students, UNLIMITED);
    assert!(features.white_label);
    assert!(features.priority_support);
    assert!(features.sso_integration);
    assert!(features.custom_domain);
    assert!(features.dedicated_manager);
}

#[test]
fn unknown_tier_falls_back_to_starter_defaults() {
    let tier = PlanTier::from_string("enterprise");
    assert_eq!(tier, PlanTier::Starter);
    assert_eq!(plan_price(tier, BillingCycle::Monthly), 0);
    assert_eq!(plan_features(tier).max_courses, 5);
}

#[test]
fn unknown_cycle_falls_back_to_monthly() {
    let cycle = BillingCycle::from_string("weekly");
    assert_eq!(cycle, BillingCycle::Monthly);
    assert_eq!(cycle.period_days(), 30);
    assert_eq!(BillingCycle::Yearly.period_days(), 365);
}

#[test]
fn tier_ranks_are_strictly_ordered() {
    assert!(PlanTier::Starter.rank() < PlanTier::Pro.rank());
    assert!(PlanTier::Pro.rank() < PlanTier::Premium.rank());
}
