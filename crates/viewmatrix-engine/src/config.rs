/// What happens when a guaranteed view would push a campaign past its
/// contracted quota before the external scheduler marks it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverCreditPolicy {
    /// Credit the view anyway. Matches the historical behavior: a campaign
    /// can briefly over-fill while completion is pending.
    Soft,

    /// Guard the counter update with the remaining headroom and redirect
    /// the excess view to `bonus_views`.
    CapToBonus,
}

/// Configuration for the attribution and placement engines
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Over-crediting policy for guaranteed views
    pub over_credit: OverCreditPolicy,

    /// Payout, in cents, fixed on each matrix entry at creation and owed to
    /// the owner once all six slots fill
    pub matrix_payout_amount: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            over_credit: OverCreditPolicy::Soft,
            matrix_payout_amount: 2_500, // $25.00
        }
    }
}
