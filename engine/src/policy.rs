//! Tunable policy constants.
//!
//! The expiry window, priority thresholds, reward bonuses, and the discount
//! step are operational policy, not domain invariants — they are injected at
//! engine construction and may be overridden through backend configuration.

/// Policy knobs with the marketplace defaults.
#[derive(Debug, Clone)]
pub struct EnginePolicy {
    /// Hours after declaration at which an organic lot expires.
    pub expiry_hours: i64,
    /// Remaining time below which an expiring request is `High` priority.
    pub high_priority_within_hours: i64,
    /// Remaining time below which an expiring request is `Medium` priority.
    pub medium_priority_within_hours: i64,
    /// Points credited to a supplier per declared lot.
    pub declaration_bonus: i64,
    /// Points credited to the assignee per completed delivery.
    pub collection_bonus: i64,
    /// Whole points consumed per discount step.
    pub points_per_discount_step: i64,
    /// Percent of discount granted per step (100 points ⇒ 10%).
    pub discount_step_percent: u32,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            expiry_hours: 48,
            high_priority_within_hours: 12,
            medium_priority_within_hours: 24,
            declaration_bonus: 10,
            collection_bonus: 50,
            points_per_discount_step: 100,
            discount_step_percent: 10,
        }
    }
}
