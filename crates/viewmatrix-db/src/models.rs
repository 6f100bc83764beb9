/*!
# Persisted Model Types

Row types for the Campaign Store, View Ledger, Matrix Store, participant
registry, and notification outbox. Field names are the contract other
components read directly (reporting pulls `bonus_views`, the admin UI reads
`spot_2..spot_7`), so they mirror the column names exactly.
*/

use serde::{Deserialize, Serialize};

/// Lifecycle status of a campaign.
///
/// `queued -> active -> {completed, cancelled}` and `queued -> cancelled`;
/// `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Queued,
    Active,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Queued => "queued",
            CampaignStatus::Active => "active",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(CampaignStatus::Queued),
            "active" => Some(CampaignStatus::Active),
            "completed" => Some(CampaignStatus::Completed),
            "cancelled" => Some(CampaignStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the campaign can still be cancelled from this status.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, CampaignStatus::Queued | CampaignStatus::Active)
    }
}

/// How a promotional card was shown to a viewer.
///
/// Each kind maps to its own guaranteed-view counter on the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    GameDisplay,
    EyeballClick,
    CardBack,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::GameDisplay => "game_display",
            ViewKind::EyeballClick => "eyeball_click",
            ViewKind::CardBack => "card_back",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "game_display" => Some(ViewKind::GameDisplay),
            "eyeball_click" => Some(ViewKind::EyeballClick),
            "card_back" => Some(ViewKind::CardBack),
            _ => None,
        }
    }

    /// The campaign counter column this view kind credits.
    pub(crate) fn counter_column(&self) -> &'static str {
        match self {
            ViewKind::GameDisplay => "views_from_game",
            ViewKind::EyeballClick => "views_from_flips",
            ViewKind::CardBack => "views_from_card_back",
        }
    }
}

/// Payout state of a matrix entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Paid,
    Forfeited,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Forfeited => "forfeited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PayoutStatus::Pending),
            "paid" => Some(PayoutStatus::Paid),
            "forfeited" => Some(PayoutStatus::Forfeited),
            _ => None,
        }
    }
}

/// A child slot in a matrix entry, `spot_2` through `spot_7`.
///
/// Slots fill in numeric order: the direct slots (2, 3) first, then the
/// extension slots (4..7). A filled slot is never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spot {
    Spot2,
    Spot3,
    Spot4,
    Spot5,
    Spot6,
    Spot7,
}

impl Spot {
    /// All slots in fill-priority order.
    pub const ALL: [Spot; 6] = [
        Spot::Spot2,
        Spot::Spot3,
        Spot::Spot4,
        Spot::Spot5,
        Spot::Spot6,
        Spot::Spot7,
    ];

    pub fn number(&self) -> u8 {
        match self {
            Spot::Spot2 => 2,
            Spot::Spot3 => 3,
            Spot::Spot4 => 4,
            Spot::Spot5 => 5,
            Spot::Spot6 => 6,
            Spot::Spot7 => 7,
        }
    }

    pub fn from_number(n: u8) -> Option<Spot> {
        match n {
            2 => Some(Spot::Spot2),
            3 => Some(Spot::Spot3),
            4 => Some(Spot::Spot4),
            5 => Some(Spot::Spot5),
            6 => Some(Spot::Spot6),
            7 => Some(Spot::Spot7),
            _ => None,
        }
    }

    /// Spots 2 and 3 are the direct-referral slots.
    pub fn is_direct(&self) -> bool {
        matches!(self, Spot::Spot2 | Spot::Spot3)
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            Spot::Spot2 => "spot_2",
            Spot::Spot3 => "spot_3",
            Spot::Spot4 => "spot_4",
            Spot::Spot5 => "spot_5",
            Spot::Spot6 => "spot_6",
            Spot::Spot7 => "spot_7",
        }
    }
}

/// A participant in the platform (advertiser / matrix member).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub username: String,
    /// Direct referrals credited to this participant (spot 2/3 placements
    /// under an explicit referral link).
    pub referral_count: u64,
    pub created_at: i64,
}

/// A purchased view package and its attribution counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub owner_id: i64,
    /// Contracted quota of guaranteed views.
    pub views_guaranteed: u64,
    pub views_from_game: u64,
    pub views_from_flips: u64,
    pub views_from_card_back: u64,
    /// Non-billable impressions: repeat viewers, anonymous viewers, or
    /// views landing after the active quota is gone. No upper bound.
    pub bonus_views: u64,
    pub status: CampaignStatus,
    pub cancel_reason: Option<String>,
    /// Remaining guaranteed headroom at cancellation time, frozen.
    pub forfeited_views: Option<u64>,
    pub cancelled_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Campaign {
    /// Views that count against the contracted quota.
    pub fn total_counted_views(&self) -> u64 {
        self.views_from_game + self.views_from_flips + self.views_from_card_back
    }
}

/// A View Ledger entry. At most one record may ever exist for a given
/// non-null `(viewer_id, card_id)` pair; it is the dedup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRecord {
    pub viewer_id: Option<i64>,
    pub card_id: i64,
    pub view_type: ViewKind,
    pub created_at: i64,
}

/// One participant's 6-slot referral tree.
///
/// The owner is the implicit root (spot 1); children occupy `spot_2` through
/// `spot_7`. Slots are write-once and never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub id: i64,
    pub owner_id: i64,
    /// The campaign that was active when the owner joined; the eligibility
    /// proof. Cancelling it forfeits this entry's payout.
    pub campaign_id: i64,
    pub spot_2: Option<i64>,
    pub spot_3: Option<i64>,
    pub spot_4: Option<i64>,
    pub spot_5: Option<i64>,
    pub spot_6: Option<i64>,
    pub spot_7: Option<i64>,
    pub is_active: bool,
    pub is_completed: bool,
    /// Reward, in cents, fixed at entry creation and owed on completion.
    pub payout_amount: u64,
    pub payout_status: PayoutStatus,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl MatrixEntry {
    pub fn spot(&self, spot: Spot) -> Option<i64> {
        match spot {
            Spot::Spot2 => self.spot_2,
            Spot::Spot3 => self.spot_3,
            Spot::Spot4 => self.spot_4,
            Spot::Spot5 => self.spot_5,
            Spot::Spot6 => self.spot_6,
            Spot::Spot7 => self.spot_7,
        }
    }

    /// First unfilled slot in fill-priority order.
    pub fn first_open_spot(&self) -> Option<Spot> {
        Spot::ALL.into_iter().find(|s| self.spot(*s).is_none())
    }

    pub fn is_full(&self) -> bool {
        self.first_open_spot().is_none()
    }
}

/// Kind of an outbox notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ReferralJoined,
    MatrixGrowth,
    FreeReferral,
    MatrixComplete,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ReferralJoined => "referral_joined",
            NotificationKind::MatrixGrowth => "matrix_growth",
            NotificationKind::FreeReferral => "free_referral",
            NotificationKind::MatrixComplete => "matrix_complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "referral_joined" => Some(NotificationKind::ReferralJoined),
            "matrix_growth" => Some(NotificationKind::MatrixGrowth),
            "free_referral" => Some(NotificationKind::FreeReferral),
            "matrix_complete" => Some(NotificationKind::MatrixComplete),
            _ => None,
        }
    }
}

/// An outbox record not yet persisted. Built by the engines and written in
/// the same transaction as the matrix mutation it announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

/// A persisted outbox record, awaiting the external delivery worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: i64,
}
