/*!
# Referral Placement Engine

Places a newly-joined participant into the shared 6-slot referral tree and
detects completion.

Placement policy, in priority order:

1. **Referred placement**: the referrer's own entry, first open slot in
   `spot_2..spot_7` order. Direct slots (2, 3) credit the referrer's
   referral counter and announce `referral_joined`; extension slots (4..7)
   announce `matrix_growth`.
2. **Fallback placement**: the oldest active, incomplete entry with an open
   slot, skipping the joiner's own entry. Direct slots announce
   `free_referral`; extension slots announce nothing.
3. **No open slot anywhere**: not an error; the joiner's fresh entry simply
   waits for future joiners.

Every slot fill is a conditional write. Losing a race for a slot advances
to the next candidate slot or entry instead of overwriting.
*/

use crate::{
    error::{JoinError, JoinResult},
    lock_db, notifications, EngineConfig, SharedDatabase,
};
use tracing::{debug, info};
use viewmatrix_db::{
    CampaignStatus, DbError, DbResult, EngineDatabase, NotificationDraft, Participant, Spot,
};

/// Result of a successful `join_matrix` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The joiner's own, freshly created matrix entry.
    pub entry_id: i64,
    /// Whether the joiner landed in someone else's tree.
    pub placed: bool,
    /// The slot number (2..7) taken, when placed.
    pub spot: Option<u8>,
    /// The entry that received the joiner, when placed.
    pub host_entry_id: Option<i64>,
}

enum PlacementKind {
    Referred { referrer_id: i64 },
    Fallback,
}

/// The matrix placement engine
pub struct PlacementEngine {
    db: SharedDatabase,
    payout_amount: u64,
}

impl PlacementEngine {
    pub fn new(db: SharedDatabase, config: &EngineConfig) -> Self {
        Self {
            db,
            payout_amount: config.matrix_payout_amount,
        }
    }

    /// Opt a participant into the matrix and place them in the tree.
    ///
    /// Preconditions, checked in order: the named campaign must be the
    /// participant's own active campaign; the participant must not already
    /// hold an active entry; a non-blank referrer username must resolve to
    /// someone other than the participant. A blank referrer skips referral
    /// without error.
    ///
    /// A participant who already occupies a child slot anywhere, such as a
    /// rejoiner whose earlier campaign was cancelled, receives a fresh entry
    /// but is not placed a second time.
    pub fn join_matrix(
        &self,
        participant_id: i64,
        active_campaign_id: i64,
        referrer_username: Option<&str>,
    ) -> JoinResult<JoinOutcome> {
        let mut db = lock_db(&self.db)?;

        let campaign = db
            .campaign(active_campaign_id)?
            .filter(|c| c.owner_id == participant_id && c.status == CampaignStatus::Active)
            .ok_or(JoinError::NoActiveCampaign)?;

        if db.active_entry_for_owner(participant_id)?.is_some() {
            return Err(JoinError::AlreadyJoined);
        }

        let referrer = match referrer_username.map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(name) => {
                let referrer = db
                    .participant_by_username(name)?
                    .ok_or_else(|| JoinError::ReferrerNotFound(name.to_string()))?;
                if referrer.id == participant_id {
                    return Err(JoinError::SelfReferral);
                }
                Some(referrer)
            }
        };

        let joiner = db
            .participant(participant_id)?
            .ok_or_else(|| DbError::NotFound(format!("participant {}", participant_id)))?;

        let entry = db.create_matrix_entry(participant_id, campaign.id, self.payout_amount)?;
        info!(
            participant_id,
            campaign_id = campaign.id,
            entry_id = entry.id,
            "participant joined the matrix"
        );

        // A participant occupies at most one child slot system-wide, ever.
        // Slots are never cleared, so a rejoiner who was placed under an
        // earlier campaign keeps that slot and only gets the fresh entry.
        if db.is_placed(participant_id)? {
            debug!(
                participant_id,
                entry_id = entry.id,
                "joiner already occupies a slot, skipping placement"
            );
            return Ok(JoinOutcome {
                entry_id: entry.id,
                placed: false,
                spot: None,
                host_entry_id: None,
            });
        }

        let placement = self.place_new_participant(&mut db, &joiner, referrer.as_ref())?;
        let outcome = match placement {
            Some((host_entry_id, spot)) => JoinOutcome {
                entry_id: entry.id,
                placed: true,
                spot: Some(spot.number()),
                host_entry_id: Some(host_entry_id),
            },
            None => JoinOutcome {
                entry_id: entry.id,
                placed: false,
                spot: None,
                host_entry_id: None,
            },
        };
        Ok(outcome)
    }

    /// Find and fill a slot for the joiner. Returns the host entry and slot,
    /// or None when no entry anywhere has an open slot.
    fn place_new_participant(
        &self,
        db: &mut EngineDatabase,
        joiner: &Participant,
        referrer: Option<&Participant>,
    ) -> DbResult<Option<(i64, Spot)>> {
        if let Some(referrer) = referrer {
            if let Some(entry) = db.active_entry_for_owner(referrer.id)? {
                if !entry.is_completed {
                    let kind = PlacementKind::Referred {
                        referrer_id: referrer.id,
                    };
                    if let Some(spot) = self.try_fill_entry(db, entry.id, joiner, &kind)? {
                        return Ok(Some((entry.id, spot)));
                    }
                    debug!(
                        referrer_id = referrer.id,
                        entry_id = entry.id,
                        "referrer's entry has no open slot, falling back to global placement"
                    );
                }
            }
        }

        for entry in db.open_entries(joiner.id)? {
            if let Some(spot) = self.try_fill_entry(db, entry.id, joiner, &PlacementKind::Fallback)? {
                return Ok(Some((entry.id, spot)));
            }
        }

        debug!(joiner_id = joiner.id, "no open slot anywhere, entry awaits future joiners");
        Ok(None)
    }

    /// Fill the first open slot of one entry, re-reading and advancing on
    /// conflict until the entry closes or runs out of open slots.
    fn try_fill_entry(
        &self,
        db: &mut EngineDatabase,
        entry_id: i64,
        joiner: &Participant,
        kind: &PlacementKind,
    ) -> DbResult<Option<Spot>> {
        loop {
            let entry = match db.matrix_entry(entry_id)? {
                Some(entry) if entry.is_active && !entry.is_completed => entry,
                _ => return Ok(None),
            };
            let Some(spot) = entry.first_open_spot() else {
                return Ok(None);
            };

            let (credit_referrer, notification) =
                self.fill_effects(entry.owner_id, joiner, spot, kind);
            if db.fill_spot(entry_id, spot, joiner.id, credit_referrer, notification.as_ref())? {
                info!(
                    entry_id,
                    joiner_id = joiner.id,
                    spot = spot.number(),
                    "slot filled"
                );
                self.check_completion(db, entry_id)?;
                return Ok(Some(spot));
            }
            // Lost the race for this slot; re-read and take the next one
        }
    }

    /// The referral-counter credit and outbox notification a fill carries.
    fn fill_effects(
        &self,
        host_owner_id: i64,
        joiner: &Participant,
        spot: Spot,
        kind: &PlacementKind,
    ) -> (Option<i64>, Option<NotificationDraft>) {
        match kind {
            PlacementKind::Referred { referrer_id } => {
                if spot.is_direct() {
                    (
                        Some(*referrer_id),
                        Some(notifications::referral_joined(
                            *referrer_id,
                            &joiner.username,
                            spot,
                        )),
                    )
                } else {
                    (
                        None,
                        Some(notifications::matrix_growth(
                            host_owner_id,
                            &joiner.username,
                            spot,
                        )),
                    )
                }
            }
            PlacementKind::Fallback => {
                if spot.is_direct() {
                    (
                        None,
                        Some(notifications::free_referral(
                            host_owner_id,
                            &joiner.username,
                            spot,
                        )),
                    )
                } else {
                    (None, None)
                }
            }
        }
    }

    /// Mark the entry completed once all six slots are filled. Monotonic:
    /// the store's conditional update makes re-checks no-ops.
    fn check_completion(&self, db: &mut EngineDatabase, entry_id: i64) -> DbResult<bool> {
        let Some(entry) = db.matrix_entry(entry_id)? else {
            return Ok(false);
        };
        if entry.is_completed || !entry.is_full() {
            return Ok(false);
        }

        let notification = notifications::matrix_complete(&entry);
        let completed = db.complete_entry_if_full(entry_id, &notification)?;
        if completed {
            info!(
                entry_id,
                owner_id = entry.owner_id,
                payout_amount = entry.payout_amount,
                "matrix entry completed, payout pending"
            );
        }
        Ok(completed)
    }
}
