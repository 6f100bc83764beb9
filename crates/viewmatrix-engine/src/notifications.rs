/*!
# Notification Drafts

Builders for the outbox records the placement engine appends alongside its
matrix mutations. This core never renders or delivers them; an external
worker drains the outbox.
*/

use viewmatrix_db::{MatrixEntry, NotificationDraft, NotificationKind, Spot};

/// A direct referral (spot 2 or 3 under an explicit referrer) joined.
pub fn referral_joined(referrer_id: i64, joiner_username: &str, spot: Spot) -> NotificationDraft {
    NotificationDraft {
        recipient_id: referrer_id,
        kind: NotificationKind::ReferralJoined,
        title: "New referral".to_string(),
        message: format!(
            "{} joined your matrix at spot {} through your referral link.",
            joiner_username,
            spot.number()
        ),
    }
}

/// A referred joiner landed in an extension slot (spot 4..7).
pub fn matrix_growth(owner_id: i64, joiner_username: &str, spot: Spot) -> NotificationDraft {
    NotificationDraft {
        recipient_id: owner_id,
        kind: NotificationKind::MatrixGrowth,
        title: "Your matrix is growing".to_string(),
        message: format!(
            "{} joined your matrix at spot {}.",
            joiner_username,
            spot.number()
        ),
    }
}

/// Fallback placement filled one of the owner's direct slots without an
/// explicit referral.
pub fn free_referral(owner_id: i64, joiner_username: &str, spot: Spot) -> NotificationDraft {
    NotificationDraft {
        recipient_id: owner_id,
        kind: NotificationKind::FreeReferral,
        title: "Free referral".to_string(),
        message: format!(
            "{} was placed in your matrix at spot {}.",
            joiner_username,
            spot.number()
        ),
    }
}

/// All six slots filled; the payout is pending.
pub fn matrix_complete(entry: &MatrixEntry) -> NotificationDraft {
    NotificationDraft {
        recipient_id: entry.owner_id,
        kind: NotificationKind::MatrixComplete,
        title: "Matrix complete".to_string(),
        message: format!(
            "All six spots in your matrix are filled. Your payout of ${}.{:02} is pending.",
            entry.payout_amount / 100,
            entry.payout_amount % 100
        ),
    }
}
