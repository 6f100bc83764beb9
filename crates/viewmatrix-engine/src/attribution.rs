/*!
# View Attribution Engine

Decides, for every displayed promotional card, whether the impression counts
against the owning campaign's contracted quota (a guaranteed view) or is
recorded as a non-billable bonus view.

The decision tree, in order:

1. No active campaign for the owner: bonus view on the owner's most recent
   campaign of any status; no-op when the owner has no campaigns at all.
2. Anonymous viewer: bonus view on the active campaign.
3. Known viewer never credited for this card: guaranteed view. The ledger
   record and the counter increment commit as one unit, ledger first, so a
   crash between the two under-counts rather than double-counts.
4. Known viewer already credited for this card: bonus view.

Attribution is fire-and-forget: storage failures are logged and the event
is dropped. A missed impression is acceptable; a double-credited one is not.
*/

use crate::{config::OverCreditPolicy, lock_db, session::SessionCache, EngineConfig, SharedDatabase};
use tracing::{debug, warn};
use viewmatrix_db::{CreditOutcome, DbResult, ViewKind};

/// A "card was shown/flipped by viewer V" event from a game or the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEvent {
    /// None for anonymous viewers, who never earn guaranteed credit.
    pub viewer_id: Option<i64>,
    pub card_id: i64,
    /// The advertiser whose campaign the impression bills against.
    pub owner_id: i64,
    pub kind: ViewKind,
    /// Physical card slot within a game board, set for in-game flips only.
    /// Session dedup key component; not persisted.
    pub card_instance: Option<i64>,
}

impl ViewEvent {
    /// A whole-card display inside a game.
    pub fn game_display(viewer_id: Option<i64>, card_id: i64, owner_id: i64) -> Self {
        Self {
            viewer_id,
            card_id,
            owner_id,
            kind: ViewKind::GameDisplay,
            card_instance: None,
        }
    }

    /// An in-game flip of a specific physical card slot.
    pub fn flip(viewer_id: Option<i64>, card_id: i64, owner_id: i64, card_instance: i64) -> Self {
        Self {
            viewer_id,
            card_id,
            owner_id,
            kind: ViewKind::EyeballClick,
            card_instance: Some(card_instance),
        }
    }

    /// A gallery "eyeball" view outside any game board.
    pub fn eyeball_click(viewer_id: Option<i64>, card_id: i64, owner_id: i64) -> Self {
        Self {
            viewer_id,
            card_id,
            owner_id,
            kind: ViewKind::EyeballClick,
            card_instance: None,
        }
    }

    /// A card-back impression.
    pub fn card_back(viewer_id: Option<i64>, card_id: i64, owner_id: i64) -> Self {
        Self {
            viewer_id,
            card_id,
            owner_id,
            kind: ViewKind::CardBack,
            card_instance: None,
        }
    }
}

/// The view-attribution engine
pub struct AttributionEngine {
    db: SharedDatabase,
    over_credit: OverCreditPolicy,
    session: SessionCache,
}

impl AttributionEngine {
    pub fn new(db: SharedDatabase, config: &EngineConfig) -> Self {
        Self {
            db,
            over_credit: config.over_credit,
            session: SessionCache::new(),
        }
    }

    /// Record a card display event. Best-effort: never fails the caller;
    /// storage errors are logged and the impression is dropped.
    pub fn record_card_display(&self, event: &ViewEvent) {
        if let Err(e) = self.attribute(event) {
            warn!(
                card_id = event.card_id,
                owner_id = event.owner_id,
                error = %e,
                "dropping view event after storage failure"
            );
        }
    }

    /// Record a game-originated event, at most once per session key.
    ///
    /// Games re-render cards freely; this gate keeps one game session from
    /// re-triggering attribution for the same physical card slot. Events
    /// from outside a game session go through [`record_card_display`].
    ///
    /// [`record_card_display`]: AttributionEngine::record_card_display
    pub fn record_game_event(&self, event: &ViewEvent) {
        if !self.session.claim(event) {
            debug!(
                owner_id = event.owner_id,
                card_id = event.card_id,
                "view event already processed this session"
            );
            return;
        }
        self.record_card_display(event);
    }

    /// Start a new game session, forgetting the session dedup cache.
    pub fn reset_session(&self) {
        self.session.reset();
    }

    fn attribute(&self, event: &ViewEvent) -> DbResult<()> {
        let mut db = lock_db(&self.db)?;

        let campaign = match db.active_campaign(event.owner_id)? {
            Some(campaign) => campaign,
            None => {
                // No active quota left; acknowledge the impression as bonus
                // on the most recent campaign, skipping dedup entirely.
                match db.latest_campaign(event.owner_id)? {
                    Some(fallback) => {
                        db.add_bonus_view(fallback.id)?;
                        debug!(
                            campaign_id = fallback.id,
                            owner_id = event.owner_id,
                            "bonus view (no active campaign)"
                        );
                    }
                    None => {
                        debug!(owner_id = event.owner_id, "owner has no campaigns, ignoring view");
                    }
                }
                return Ok(());
            }
        };

        let Some(viewer_id) = event.viewer_id else {
            db.add_bonus_view(campaign.id)?;
            debug!(campaign_id = campaign.id, "bonus view (anonymous viewer)");
            return Ok(());
        };

        let cap_at_quota = self.over_credit == OverCreditPolicy::CapToBonus;
        let outcome =
            db.credit_guaranteed_view(campaign.id, viewer_id, event.card_id, event.kind, cap_at_quota)?;
        match outcome {
            CreditOutcome::Credited => {
                debug!(
                    campaign_id = campaign.id,
                    viewer_id,
                    card_id = event.card_id,
                    kind = event.kind.as_str(),
                    "guaranteed view credited"
                );
            }
            CreditOutcome::Duplicate | CreditOutcome::QuotaExhausted => {
                db.add_bonus_view(campaign.id)?;
                debug!(
                    campaign_id = campaign.id,
                    viewer_id,
                    card_id = event.card_id,
                    outcome = ?outcome,
                    "bonus view"
                );
            }
        }

        Ok(())
    }
}
