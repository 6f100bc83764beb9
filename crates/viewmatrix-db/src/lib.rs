/*!
# ViewMatrix Database Management

This crate provides unified database access for the ViewMatrix engines.

It owns the persisted schema the rest of the platform keys off of:

- **Campaign Store**: advertising campaigns, their view counters, and their
  lifecycle status fields
- **View Ledger**: append-only `(viewer, card)` records used for view dedup
- **Matrix Store**: 6-slot referral tree entries and their payout fields
- **Participant registry**: username resolution and referral counters
- **Notification outbox**: placement/completion notification records,
  appended in the same transaction as the matrix mutation they describe and
  drained by an external delivery worker

Every mutation that has to be race-safe (counter increments, slot fills,
status transitions, completion) is expressed as a conditional SQL update so
the guarantees hold even when several processes share the database file.
*/

pub mod database;
pub mod errors;
pub mod models;
pub mod schema;

// Re-export main types for convenience
pub use database::{CancelOutcome, CreditOutcome, EngineDatabase};
pub use errors::{DbError, DbResult};
pub use models::{
    Campaign, CampaignStatus, MatrixEntry, Notification, NotificationDraft, NotificationKind,
    Participant, PayoutStatus, Spot, ViewKind, ViewRecord,
};
