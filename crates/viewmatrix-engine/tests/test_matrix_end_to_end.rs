//! Full walkthrough: an empty pool grows one tree from first join to
//! completion and payout notification.

mod common;

use common::Harness;
use viewmatrix_db::{NotificationKind, PayoutStatus, Spot};

#[test]
fn test_matrix_grows_from_empty_pool_to_payout() {
    let h = Harness::new();
    let placement = h.placement();

    // A has an active campaign and joins the empty pool: nowhere to place
    let a = h.participant("a");
    let a_campaign = h.campaign(a, 10);
    let outcome = placement.join_matrix(a, a_campaign, None).unwrap();
    assert!(!outcome.placed);

    let a_entry = h.entry_row(outcome.entry_id);
    assert!(Spot::ALL.iter().all(|s| a_entry.spot(*s).is_none()));

    // B joins referencing A: direct referral into spot 2
    let b = h.participant("b");
    let b_campaign = h.campaign(b, 10);
    let outcome = placement.join_matrix(b, b_campaign, Some("a")).unwrap();
    assert_eq!(outcome.spot, Some(2));
    assert_eq!(outcome.host_entry_id, Some(a_entry.id));
    assert_eq!(h.referral_count(a), 1);
    assert_eq!(h.notifications_of_kind(a, NotificationKind::ReferralJoined), 1);

    // C through F join with no referrer: fallback placement walks A's entry,
    // oldest open entry in the pool, spot by spot
    let mut spots = Vec::new();
    for name in ["c", "d", "e", "f"] {
        let id = h.participant(name);
        let campaign = h.campaign(id, 10);
        let outcome = placement.join_matrix(id, campaign, None).unwrap();
        assert_eq!(outcome.host_entry_id, Some(a_entry.id));
        spots.push(outcome.spot.unwrap());
    }
    assert_eq!(spots, vec![3, 4, 5, 6]);

    // Only the spot-3 fill was a direct slot, so exactly one free_referral
    assert_eq!(h.notifications_of_kind(a, NotificationKind::FreeReferral), 1);
    assert_eq!(h.referral_count(a), 1);

    // The 7th joiner closes the tree
    let g = h.participant("g");
    let g_campaign = h.campaign(g, 10);
    let outcome = placement.join_matrix(g, g_campaign, None).unwrap();
    assert_eq!(outcome.spot, Some(7));

    let a_entry = h.entry_row(a_entry.id);
    assert!(a_entry.is_completed);
    assert!(a_entry.is_active);
    assert_eq!(a_entry.payout_status, PayoutStatus::Pending);

    let complete: Vec<_> = h
        .notifications(a)
        .into_iter()
        .filter(|n| n.kind == NotificationKind::MatrixComplete)
        .collect();
    assert_eq!(complete.len(), 1);
    assert!(complete[0].message.contains("$25.00"));
}
