/*!
# Database Schema Management

This module contains the complete schema for the ViewMatrix stores and
provides initialization and version-check functionality.
*/

use crate::{DbError, DbResult};
use rusqlite::Connection;

/// Current database schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize database with complete schema
pub fn initialize_database(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- Participant registry: username resolution and referral counters
        CREATE TABLE participants (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL COLLATE NOCASE UNIQUE,
            referral_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        -- Campaign Store: view packages, counters, lifecycle status
        CREATE TABLE campaigns (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL REFERENCES participants(id),
            views_guaranteed INTEGER NOT NULL,
            views_from_game INTEGER NOT NULL DEFAULT 0,
            views_from_flips INTEGER NOT NULL DEFAULT 0,
            views_from_card_back INTEGER NOT NULL DEFAULT 0,
            bonus_views INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'queued',
            cancel_reason TEXT,
            forfeited_views INTEGER, -- frozen at cancellation time
            cancelled_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- At most one active campaign per owner
        CREATE UNIQUE INDEX idx_campaigns_one_active
            ON campaigns(owner_id) WHERE status = 'active';
        CREATE INDEX idx_campaigns_owner ON campaigns(owner_id, created_at);

        -- View Ledger: append-only dedup records for guaranteed views
        CREATE TABLE view_ledger (
            viewer_id INTEGER,
            card_id INTEGER NOT NULL,
            view_type TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        -- The dedup key: one guaranteed-counting record per (viewer, card)
        CREATE UNIQUE INDEX idx_view_ledger_dedup
            ON view_ledger(viewer_id, card_id);

        -- Matrix Store: 6-slot referral trees and payout tracking
        CREATE TABLE matrix_entries (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL REFERENCES participants(id),
            campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
            spot_2 INTEGER,
            spot_3 INTEGER,
            spot_4 INTEGER,
            spot_5 INTEGER,
            spot_6 INTEGER,
            spot_7 INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_completed INTEGER NOT NULL DEFAULT 0,
            payout_amount INTEGER NOT NULL, -- cents
            payout_status TEXT NOT NULL DEFAULT 'pending',
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );

        CREATE INDEX idx_matrix_open
            ON matrix_entries(is_active, is_completed, created_at);
        CREATE INDEX idx_matrix_campaign ON matrix_entries(campaign_id);
        CREATE INDEX idx_matrix_owner ON matrix_entries(owner_id);

        -- Notification outbox, drained by the external delivery worker
        CREATE TABLE notifications (
            id INTEGER PRIMARY KEY,
            recipient_id INTEGER NOT NULL REFERENCES participants(id),
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_notifications_recipient
            ON notifications(recipient_id, id);

        -- Schema version tracking
        CREATE TABLE schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, strftime('%s', 'now'))",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Check if database is properly initialized
pub fn check_schema(conn: &Connection) -> DbResult<bool> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='campaigns'")?;

    let mut rows = stmt.query_map([], |_row| Ok(()))?;

    Ok(rows.next().is_some())
}

/// Get current schema version from database
pub fn get_schema_version(conn: &Connection) -> DbResult<Option<i32>> {
    // Check if schema_version table exists first
    let table_exists = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='schema_version'")
        .and_then(|mut stmt| {
            let mut rows = stmt.query_map([], |_| Ok(()))?;
            Ok(rows.next().is_some())
        })
        .unwrap_or(false);

    if !table_exists {
        return Ok(None);
    }

    let mut stmt = conn.prepare("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")?;

    let mut rows = stmt.query_map([], |row| {
        let version: i32 = row.get(0)?;
        Ok(version)
    })?;

    if let Some(row) = rows.next() {
        Ok(Some(row.map_err(DbError::Database)?))
    } else {
        Ok(None)
    }
}
