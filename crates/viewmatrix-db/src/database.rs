/*!
# Database Operations

Unified database interface for the Campaign Store, View Ledger, Matrix
Store, participant registry, and notification outbox.

Every guarded transition here is a conditional SQL update (`WHERE status IN
(...)`, `WHERE spot_n IS NULL`, `SET counter = counter + 1`) rather than an
application-level read-modify-write, so concurrent writers race on the
database row, not on stale in-memory copies. Callers observe a conflict as a
`false`/`None` result and advance to the next candidate.
*/

use crate::{
    models::{
        Campaign, CampaignStatus, MatrixEntry, Notification, NotificationDraft, NotificationKind,
        Participant, PayoutStatus, Spot, ViewKind, ViewRecord,
    },
    schema::{check_schema, initialize_database},
    DbError, DbResult,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

const CAMPAIGN_COLUMNS: &str = "id, owner_id, views_guaranteed, views_from_game, \
     views_from_flips, views_from_card_back, bonus_views, status, cancel_reason, \
     forfeited_views, cancelled_at, created_at, updated_at";

const MATRIX_COLUMNS: &str = "id, owner_id, campaign_id, spot_2, spot_3, spot_4, \
     spot_5, spot_6, spot_7, is_active, is_completed, payout_amount, payout_status, \
     created_at, completed_at";

/// Outcome of attempting to credit a guaranteed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Ledger record written and the campaign counter incremented.
    Credited,
    /// A ledger record for this `(viewer, card)` already exists.
    Duplicate,
    /// The quota cap was enforced and the campaign has no headroom left.
    /// The ledger insert was rolled back, so the view stays bonus-eligible.
    QuotaExhausted,
}

/// Result of cancelling a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOutcome {
    /// Guaranteed headroom lost at cancellation time, clamped at zero.
    pub forfeited_views: u64,
}

/// Unified database interface for the ViewMatrix stores
pub struct EngineDatabase {
    conn: Connection,
}

impl EngineDatabase {
    /// Open an existing database file
    pub fn open(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Err(DbError::InvalidConfig(format!(
                "Database file does not exist: {}",
                path.display()
            )));
        }

        let conn = Connection::open(path)
            .map_err(|e| DbError::Connection(format!("Failed to open database: {}", e)))?;

        // Verify it has the expected schema
        let db = Self { conn };
        if !db.verify_schema()? {
            return Err(DbError::InvalidConfig(format!(
                "Database file has invalid schema: {}",
                path.display()
            )));
        }

        Ok(db)
    }

    /// Create a new in-memory database with initialized schema
    pub fn create_in_memory() -> DbResult<Self> {
        let conn = Connection::open(":memory:").map_err(|e| {
            DbError::Connection(format!("Failed to create in-memory database: {}", e))
        })?;

        initialize_database(&conn)?;

        Ok(Self { conn })
    }

    /// Create a new database file, overwriting if it exists
    pub fn create_file(path: &Path, overwrite: bool) -> DbResult<Self> {
        if path.exists() && !overwrite {
            return Err(DbError::InvalidConfig(format!(
                "Database file already exists (use overwrite=true to replace): {}",
                path.display()
            )));
        }

        if path.exists() && overwrite {
            std::fs::remove_file(path).map_err(|e| {
                DbError::Connection(format!("Failed to remove existing file: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| DbError::Connection(format!("Failed to create database file: {}", e)))?;

        initialize_database(&conn)?;

        Ok(Self { conn })
    }

    /// Check if database has proper schema
    pub fn verify_schema(&self) -> DbResult<bool> {
        check_schema(&self.conn)
    }

    /// Get underlying connection for advanced operations
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // =============================================================================
    // Participants
    // =============================================================================

    pub fn create_participant(&mut self, username: &str) -> DbResult<Participant> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DbError::InvalidConfig(
                "Participant username must not be empty".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO participants (username, created_at) VALUES (?1, ?2)",
            params![username, now()],
        )?;
        let id = self.conn.last_insert_rowid();

        self.participant(id)?
            .ok_or_else(|| DbError::NotFound(format!("participant {}", id)))
    }

    pub fn participant(&self, id: i64) -> DbResult<Option<Participant>> {
        let participant = self
            .conn
            .query_row(
                "SELECT id, username, referral_count, created_at FROM participants WHERE id = ?1",
                [id],
                row_to_participant,
            )
            .optional()?;
        Ok(participant)
    }

    /// Look up a participant by username, case-insensitively.
    pub fn participant_by_username(&self, username: &str) -> DbResult<Option<Participant>> {
        let participant = self
            .conn
            .query_row(
                "SELECT id, username, referral_count, created_at FROM participants \
                 WHERE username = ?1",
                [username.trim()],
                row_to_participant,
            )
            .optional()?;
        Ok(participant)
    }

    // =============================================================================
    // Campaign Store
    // =============================================================================

    /// Create a campaign for an owner. The new campaign goes straight to
    /// `active` if the owner has no active campaign, otherwise it queues
    /// behind it in FIFO order.
    pub fn create_campaign(&mut self, owner_id: i64, views_guaranteed: u64) -> DbResult<Campaign> {
        let tx = self.conn.transaction()?;
        let ts = now();

        // The one-active-per-owner partial index is the arbiter, not a
        // read-then-write existence check: try to activate, and queue when
        // another campaign (possibly inserted by a concurrent writer)
        // already holds the active slot.
        let insert = |status: CampaignStatus| {
            tx.execute(
                "INSERT INTO campaigns (owner_id, views_guaranteed, status, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![owner_id, views_guaranteed, status.as_str(), ts],
            )
        };
        match insert(CampaignStatus::Active) {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                insert(CampaignStatus::Queued)?;
            }
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;

        self.campaign(id)?
            .ok_or_else(|| DbError::NotFound(format!("campaign {}", id)))
    }

    pub fn campaign(&self, id: i64) -> DbResult<Option<Campaign>> {
        let campaign = self
            .conn
            .query_row(
                &format!("SELECT {} FROM campaigns WHERE id = ?1", CAMPAIGN_COLUMNS),
                [id],
                row_to_campaign,
            )
            .optional()?;
        Ok(campaign)
    }

    /// The owner's single active campaign, if any.
    pub fn active_campaign(&self, owner_id: i64) -> DbResult<Option<Campaign>> {
        let campaign = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM campaigns WHERE owner_id = ?1 AND status = 'active'",
                    CAMPAIGN_COLUMNS
                ),
                [owner_id],
                row_to_campaign,
            )
            .optional()?;
        Ok(campaign)
    }

    /// The owner's most recently created campaign of any status. Fallback
    /// target for bonus views when no campaign is active.
    pub fn latest_campaign(&self, owner_id: i64) -> DbResult<Option<Campaign>> {
        let campaign = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM campaigns WHERE owner_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    CAMPAIGN_COLUMNS
                ),
                [owner_id],
                row_to_campaign,
            )
            .optional()?;
        Ok(campaign)
    }

    /// Increment `bonus_views` on a campaign.
    pub fn add_bonus_view(&mut self, campaign_id: i64) -> DbResult<()> {
        let changed = self.conn.execute(
            "UPDATE campaigns SET bonus_views = bonus_views + 1, updated_at = ?1 WHERE id = ?2",
            params![now(), campaign_id],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound(format!("campaign {}", campaign_id)));
        }
        Ok(())
    }

    /// Credit a guaranteed view: insert the dedup ledger record and bump the
    /// counter mapped from `kind`, as one transaction.
    ///
    /// The ledger insert happens before the counter increment inside the
    /// transaction; a duplicate `(viewer, card)` pair short-circuits to
    /// [`CreditOutcome::Duplicate`] without touching the campaign. With
    /// `cap_at_quota`, the counter update is additionally guarded by the
    /// remaining quota headroom and a miss rolls the ledger insert back.
    pub fn credit_guaranteed_view(
        &mut self,
        campaign_id: i64,
        viewer_id: i64,
        card_id: i64,
        kind: ViewKind,
        cap_at_quota: bool,
    ) -> DbResult<CreditOutcome> {
        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO view_ledger (viewer_id, card_id, view_type, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![viewer_id, card_id, kind.as_str(), now()],
        )?;
        if inserted == 0 {
            return Ok(CreditOutcome::Duplicate);
        }

        let guard = if cap_at_quota {
            " AND views_from_game + views_from_flips + views_from_card_back < views_guaranteed"
        } else {
            ""
        };
        let counter = kind.counter_column();
        let changed = tx.execute(
            &format!(
                "UPDATE campaigns SET {col} = {col} + 1, updated_at = ?1 WHERE id = ?2{guard}",
                col = counter,
                guard = guard
            ),
            params![now(), campaign_id],
        )?;
        if changed == 0 {
            // Dropping the transaction rolls the ledger insert back
            return Ok(CreditOutcome::QuotaExhausted);
        }

        tx.commit()?;
        Ok(CreditOutcome::Credited)
    }

    /// Read a ledger record by its dedup key.
    pub fn view_record(&self, viewer_id: i64, card_id: i64) -> DbResult<Option<ViewRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT viewer_id, card_id, view_type, created_at FROM view_ledger \
                 WHERE viewer_id = ?1 AND card_id = ?2",
                params![viewer_id, card_id],
                |row| {
                    let view_type: String = row.get(2)?;
                    Ok((row.get(0)?, row.get(1)?, view_type, row.get(3)?))
                },
            )
            .optional()?;

        match record {
            None => Ok(None),
            Some((viewer_id, card_id, view_type, created_at)) => {
                let view_type = ViewKind::parse(&view_type).ok_or_else(|| {
                    DbError::Serialization(format!("Unknown view type: {}", view_type))
                })?;
                Ok(Some(ViewRecord {
                    viewer_id,
                    card_id,
                    view_type,
                    created_at,
                }))
            }
        }
    }

    /// Cancel a campaign from `queued` or `active`, freezing the forfeited
    /// view count and deactivating its matrix entries.
    ///
    /// Returns `Ok(None)` when the campaign is missing or already terminal;
    /// the transition is a conditional update so two racing cancellations
    /// cannot both observe success.
    pub fn cancel_campaign(
        &mut self,
        campaign_id: i64,
        reason: &str,
    ) -> DbResult<Option<CancelOutcome>> {
        let tx = self.conn.transaction()?;

        let ts = now();
        let changed = tx.execute(
            "UPDATE campaigns SET \
                 status = 'cancelled', \
                 cancel_reason = ?1, \
                 cancelled_at = ?2, \
                 updated_at = ?2, \
                 forfeited_views = MAX(views_guaranteed \
                     - (views_from_game + views_from_flips + views_from_card_back), 0) \
             WHERE id = ?3 AND status IN ('queued', 'active')",
            params![reason, ts, campaign_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        // An entry may not stay active once its campaign is cancelled; the
        // payout is forfeited unless the tree already completed.
        tx.execute(
            "UPDATE matrix_entries SET \
                 is_active = 0, \
                 payout_status = CASE WHEN is_completed = 0 \
                     THEN 'forfeited' ELSE payout_status END \
             WHERE campaign_id = ?1 AND is_active = 1",
            [campaign_id],
        )?;

        let forfeited_views: u64 = tx.query_row(
            "SELECT forfeited_views FROM campaigns WHERE id = ?1",
            [campaign_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(Some(CancelOutcome { forfeited_views }))
    }

    /// Mark an active campaign completed. Returns whether the transition
    /// happened (false when the campaign was not active).
    pub fn complete_campaign(&mut self, campaign_id: i64) -> DbResult<bool> {
        let changed = self.conn.execute(
            "UPDATE campaigns SET status = 'completed', updated_at = ?1 \
             WHERE id = ?2 AND status = 'active'",
            params![now(), campaign_id],
        )?;
        Ok(changed == 1)
    }

    /// Activate the owner's oldest queued campaign, if no campaign is
    /// currently active. Returns the activated campaign id.
    pub fn activate_next_queued(&mut self, owner_id: i64) -> DbResult<Option<i64>> {
        let tx = self.conn.transaction()?;

        let has_active: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM campaigns WHERE owner_id = ?1 AND status = 'active')",
            [owner_id],
            |row| row.get(0),
        )?;
        if has_active {
            return Ok(None);
        }

        let next: Option<i64> = tx
            .query_row(
                "SELECT id FROM campaigns WHERE owner_id = ?1 AND status = 'queued' \
                 ORDER BY created_at, id LIMIT 1",
                [owner_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = next else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE campaigns SET status = 'active', updated_at = ?1 \
             WHERE id = ?2 AND status = 'queued'",
            params![now(), id],
        )?;
        tx.commit()?;
        Ok(Some(id))
    }

    // =============================================================================
    // Matrix Store
    // =============================================================================

    /// Create a fresh, empty matrix entry for a participant.
    pub fn create_matrix_entry(
        &mut self,
        owner_id: i64,
        campaign_id: i64,
        payout_amount: u64,
    ) -> DbResult<MatrixEntry> {
        self.conn.execute(
            "INSERT INTO matrix_entries (owner_id, campaign_id, payout_amount, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![owner_id, campaign_id, payout_amount, now()],
        )?;
        let id = self.conn.last_insert_rowid();

        self.matrix_entry(id)?
            .ok_or_else(|| DbError::NotFound(format!("matrix entry {}", id)))
    }

    pub fn matrix_entry(&self, id: i64) -> DbResult<Option<MatrixEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {} FROM matrix_entries WHERE id = ?1", MATRIX_COLUMNS),
                [id],
                row_to_matrix_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// The owner's active matrix entry, if any. An owner has at most one.
    pub fn active_entry_for_owner(&self, owner_id: i64) -> DbResult<Option<MatrixEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM matrix_entries \
                     WHERE owner_id = ?1 AND is_active = 1 LIMIT 1",
                    MATRIX_COLUMNS
                ),
                [owner_id],
                row_to_matrix_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Whether the participant already occupies a child slot in any entry,
    /// including deactivated ones. Slots are never cleared, so a participant
    /// placed once stays placed for good.
    pub fn is_placed(&self, participant_id: i64) -> DbResult<bool> {
        let placed: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM matrix_entries \
             WHERE spot_2 = ?1 OR spot_3 = ?1 OR spot_4 = ?1 \
                OR spot_5 = ?1 OR spot_6 = ?1 OR spot_7 = ?1)",
            [participant_id],
            |row| row.get(0),
        )?;
        Ok(placed)
    }

    /// Active, incomplete entries with at least one open slot, oldest first,
    /// excluding the given owner's own entry. Candidate list for fallback
    /// placement.
    pub fn open_entries(&self, exclude_owner: i64) -> DbResult<Vec<MatrixEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM matrix_entries \
             WHERE is_active = 1 AND is_completed = 0 AND owner_id != ?1 \
               AND (spot_2 IS NULL OR spot_3 IS NULL OR spot_4 IS NULL \
                    OR spot_5 IS NULL OR spot_6 IS NULL OR spot_7 IS NULL) \
             ORDER BY created_at, id",
            MATRIX_COLUMNS
        ))?;

        let rows = stmt.query_map([exclude_owner], row_to_matrix_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Conditionally fill a slot: `SET spot_n = joiner WHERE spot_n IS NULL`.
    ///
    /// Returns false when the slot was taken concurrently or the entry is no
    /// longer open; the caller advances to the next candidate. On success the
    /// referral-counter credit and outbox notification land in the same
    /// transaction as the slot write.
    pub fn fill_spot(
        &mut self,
        entry_id: i64,
        spot: Spot,
        joiner_id: i64,
        credit_referrer: Option<i64>,
        notification: Option<&NotificationDraft>,
    ) -> DbResult<bool> {
        let tx = self.conn.transaction()?;

        let changed = tx.execute(
            &format!(
                "UPDATE matrix_entries SET {col} = ?1 \
                 WHERE id = ?2 AND {col} IS NULL AND is_active = 1 AND is_completed = 0",
                col = spot.column()
            ),
            params![joiner_id, entry_id],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        if let Some(referrer_id) = credit_referrer {
            tx.execute(
                "UPDATE participants SET referral_count = referral_count + 1 WHERE id = ?1",
                [referrer_id],
            )?;
        }
        if let Some(draft) = notification {
            append_notification(&tx, draft)?;
        }

        tx.commit()?;
        Ok(true)
    }

    /// Mark an entry completed once all six slots are filled, exactly once.
    ///
    /// The completion notification is appended in the same transaction.
    /// Returns false when some slot is still open or completion already
    /// fired.
    pub fn complete_entry_if_full(
        &mut self,
        entry_id: i64,
        notification: &NotificationDraft,
    ) -> DbResult<bool> {
        let tx = self.conn.transaction()?;

        let changed = tx.execute(
            "UPDATE matrix_entries SET is_completed = 1, completed_at = ?1 \
             WHERE id = ?2 AND is_completed = 0 \
               AND spot_2 IS NOT NULL AND spot_3 IS NOT NULL AND spot_4 IS NOT NULL \
               AND spot_5 IS NOT NULL AND spot_6 IS NOT NULL AND spot_7 IS NOT NULL",
            params![now(), entry_id],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        append_notification(&tx, notification)?;

        tx.commit()?;
        Ok(true)
    }

    // =============================================================================
    // Notification outbox
    // =============================================================================

    /// Outbox records for a recipient, oldest first.
    pub fn notifications_for(&self, recipient_id: i64) -> DbResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recipient_id, kind, title, message, created_at \
             FROM notifications WHERE recipient_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map([recipient_id], |row| {
            let kind: String = row.get(2)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                kind,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut notifications = Vec::new();
        for row in rows {
            let (id, recipient_id, kind, title, message, created_at) = row?;
            let kind = NotificationKind::parse(&kind).ok_or_else(|| {
                DbError::Serialization(format!("Unknown notification kind: {}", kind))
            })?;
            notifications.push(Notification {
                id,
                recipient_id,
                kind,
                title,
                message,
                created_at,
            });
        }
        Ok(notifications)
    }
}

fn append_notification(tx: &Transaction<'_>, draft: &NotificationDraft) -> DbResult<()> {
    tx.execute(
        "INSERT INTO notifications (recipient_id, kind, title, message, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            draft.recipient_id,
            draft.kind.as_str(),
            draft.title,
            draft.message,
            now()
        ],
    )?;
    Ok(())
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_participant(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        username: row.get(1)?,
        referral_count: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_campaign(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    let status: String = row.get(7)?;
    let status = CampaignStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("unknown campaign status: {}", status).into(),
        )
    })?;

    Ok(Campaign {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        views_guaranteed: row.get(2)?,
        views_from_game: row.get(3)?,
        views_from_flips: row.get(4)?,
        views_from_card_back: row.get(5)?,
        bonus_views: row.get(6)?,
        status,
        cancel_reason: row.get(8)?,
        forfeited_views: row.get(9)?,
        cancelled_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn row_to_matrix_entry(row: &Row<'_>) -> rusqlite::Result<MatrixEntry> {
    let payout_status: String = row.get(12)?;
    let payout_status = PayoutStatus::parse(&payout_status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            rusqlite::types::Type::Text,
            format!("unknown payout status: {}", payout_status).into(),
        )
    })?;

    Ok(MatrixEntry {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        campaign_id: row.get(2)?,
        spot_2: row.get(3)?,
        spot_3: row.get(4)?,
        spot_4: row.get(5)?,
        spot_5: row.get(6)?,
        spot_6: row.get(7)?,
        spot_7: row.get(8)?,
        is_active: row.get(9)?,
        is_completed: row.get(10)?,
        payout_amount: row.get(11)?,
        payout_status,
        created_at: row.get(13)?,
        completed_at: row.get(14)?,
    })
}
