/*!
# Campaign Lifecycle

The campaign state machine: `queued -> active -> {completed, cancelled}`,
plus `queued -> cancelled`. Terminal states are immutable.

The engine owns the transitions themselves; *when* a campaign completes and
which queued campaign activates next is driven by an external scheduler,
which consumes [`is_quota_met`] and calls back in.
*/

use crate::{lock_db, LifecycleError, LifecycleResult, SharedDatabase};
use tracing::info;
use viewmatrix_db::{Campaign, CancelOutcome};

/// Whether a campaign has earned its contracted quota. Consumed by the
/// external scheduler that performs the `active -> completed` transition.
pub fn is_quota_met(campaign: &Campaign) -> bool {
    campaign.total_counted_views() >= campaign.views_guaranteed
}

/// Campaign state-machine transitions
pub struct LifecycleEngine {
    db: SharedDatabase,
}

impl LifecycleEngine {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Cancel a queued or active campaign.
    ///
    /// Freezes the forfeited view count (remaining guaranteed headroom,
    /// clamped at zero) on the record and forfeits any incomplete matrix
    /// entry backed by this campaign. Already-credited views stay credited.
    pub fn cancel_campaign(&self, campaign_id: i64, reason: &str) -> LifecycleResult<CancelOutcome> {
        let mut db = lock_db(&self.db)?;

        match db.cancel_campaign(campaign_id, reason)? {
            Some(outcome) => {
                info!(
                    campaign_id,
                    forfeited_views = outcome.forfeited_views,
                    reason,
                    "campaign cancelled"
                );
                Ok(outcome)
            }
            None => match db.campaign(campaign_id)? {
                Some(_) => Err(LifecycleError::AlreadyClosed(campaign_id)),
                None => Err(LifecycleError::CampaignNotFound(campaign_id)),
            },
        }
    }

    /// Transition an active campaign to `completed`. Scheduler-driven; the
    /// engine never self-triggers this.
    pub fn complete_campaign(&self, campaign_id: i64) -> LifecycleResult<()> {
        let mut db = lock_db(&self.db)?;

        if db.complete_campaign(campaign_id)? {
            info!(campaign_id, "campaign completed");
            return Ok(());
        }
        match db.campaign(campaign_id)? {
            Some(campaign) if campaign.status.is_cancellable() => {
                Err(LifecycleError::NotActive(campaign_id))
            }
            Some(_) => Err(LifecycleError::AlreadyClosed(campaign_id)),
            None => Err(LifecycleError::CampaignNotFound(campaign_id)),
        }
    }

    /// Activate the owner's oldest queued campaign, if none is active.
    /// Returns the activated campaign id, or None when there is nothing to
    /// activate (or another campaign still holds the active slot).
    pub fn activate_next_queued(&self, owner_id: i64) -> LifecycleResult<Option<i64>> {
        let mut db = lock_db(&self.db)?;

        let activated = db.activate_next_queued(owner_id)?;
        if let Some(campaign_id) = activated {
            info!(owner_id, campaign_id, "queued campaign activated");
        }
        Ok(activated)
    }
}
