use thiserror::Error;
use viewmatrix_db::DbError;

pub type JoinResult<T> = Result<T, JoinError>;

/// Errors surfaced to a participant attempting to join the matrix.
///
/// The validation variants are caller misuse and never retried; `Storage`
/// is transient and propagated because silently dropping a join would
/// strand the participant with no matrix entry.
#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Participant has no active campaign.")]
    NoActiveCampaign,

    #[error("Participant already has an active matrix entry.")]
    AlreadyJoined,

    #[error("A participant cannot refer themselves.")]
    SelfReferral,

    #[error("Referrer username not found: {0}")]
    ReferrerNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors from campaign lifecycle transitions.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(i64),

    #[error("Campaign {0} is already completed or cancelled.")]
    AlreadyClosed(i64),

    #[error("Campaign {0} is not active.")]
    NotActive(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}
