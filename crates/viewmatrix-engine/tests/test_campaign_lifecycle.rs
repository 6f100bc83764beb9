mod common;

use common::Harness;
use viewmatrix_db::{CampaignStatus, PayoutStatus, Spot};
use viewmatrix_engine::{is_quota_met, LifecycleError, ViewEvent};

#[test]
fn test_cancellation_freezes_forfeited_views() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 1000);
    let engine = h.attribution();

    // 300 distinct viewers of the owner's card
    for viewer in 0..300 {
        engine.record_card_display(&ViewEvent::game_display(Some(viewer), 7, owner));
    }
    assert_eq!(h.campaign_row(campaign).total_counted_views(), 300);

    let outcome = h.lifecycle().cancel_campaign(campaign, "budget cut").unwrap();
    assert_eq!(outcome.forfeited_views, 700);

    let row = h.campaign_row(campaign);
    assert_eq!(row.status, CampaignStatus::Cancelled);
    assert_eq!(row.forfeited_views, Some(700));
    assert_eq!(row.cancel_reason.as_deref(), Some("budget cut"));
}

#[test]
fn test_cancellation_forfeits_linked_matrix_entry() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 1000);

    h.placement().join_matrix(owner, campaign, None).unwrap();
    let entry = h.active_entry(owner);
    assert!(entry.is_active);
    assert_eq!(entry.payout_status, PayoutStatus::Pending);

    h.lifecycle().cancel_campaign(campaign, "ended early").unwrap();

    let entry = h.entry_row(entry.id);
    assert!(!entry.is_active);
    assert_eq!(entry.payout_status, PayoutStatus::Forfeited);
}

#[test]
fn test_cancellation_spares_completed_entry_payout() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 1000);

    h.placement().join_matrix(owner, campaign, None).unwrap();
    let entry = h.active_entry(owner);

    // Fill the tree directly and complete it before the cancellation
    {
        let mut db = h.db.lock().unwrap();
        for (i, spot) in Spot::ALL.into_iter().enumerate() {
            assert!(db.fill_spot(entry.id, spot, 100 + i as i64, None, None).unwrap());
        }
        let note = viewmatrix_engine::notifications::matrix_complete(
            &db.matrix_entry(entry.id).unwrap().unwrap(),
        );
        assert!(db.complete_entry_if_full(entry.id, &note).unwrap());
    }

    h.lifecycle().cancel_campaign(campaign, "too late").unwrap();

    let entry = h.entry_row(entry.id);
    assert!(!entry.is_active);
    // The payout was already earned; cancellation does not claw it back
    assert_eq!(entry.payout_status, PayoutStatus::Pending);
}

#[test]
fn test_cancel_rejects_missing_and_terminal_campaigns() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 10);
    let lifecycle = h.lifecycle();

    assert!(matches!(
        lifecycle.cancel_campaign(999, "nope"),
        Err(LifecycleError::CampaignNotFound(999))
    ));

    lifecycle.complete_campaign(campaign).unwrap();
    assert!(matches!(
        lifecycle.cancel_campaign(campaign, "nope"),
        Err(LifecycleError::AlreadyClosed(_))
    ));
}

#[test]
fn test_complete_requires_active_status() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let active = h.campaign(owner, 10);
    let queued = h.campaign(owner, 10);
    let lifecycle = h.lifecycle();

    assert!(matches!(
        lifecycle.complete_campaign(queued),
        Err(LifecycleError::NotActive(_))
    ));

    lifecycle.complete_campaign(active).unwrap();
    assert!(matches!(
        lifecycle.complete_campaign(active),
        Err(LifecycleError::AlreadyClosed(_))
    ));
}

#[test]
fn test_queued_campaigns_activate_in_fifo_order() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let first = h.campaign(owner, 10);
    let second = h.campaign(owner, 10);
    let third = h.campaign(owner, 10);
    let lifecycle = h.lifecycle();

    // Active slot is taken
    assert_eq!(lifecycle.activate_next_queued(owner).unwrap(), None);

    lifecycle.complete_campaign(first).unwrap();
    assert_eq!(lifecycle.activate_next_queued(owner).unwrap(), Some(second));

    lifecycle.cancel_campaign(second, "skip ahead").unwrap();
    assert_eq!(lifecycle.activate_next_queued(owner).unwrap(), Some(third));
    assert_eq!(h.campaign_row(third).status, CampaignStatus::Active);

    assert_eq!(lifecycle.activate_next_queued(owner).unwrap(), None);
}

#[test]
fn test_quota_predicate_boundary() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 2);
    let engine = h.attribution();

    engine.record_card_display(&ViewEvent::game_display(Some(1), 7, owner));
    assert!(!is_quota_met(&h.campaign_row(campaign)));

    engine.record_card_display(&ViewEvent::game_display(Some(2), 7, owner));
    assert!(is_quota_met(&h.campaign_row(campaign)));
}

#[test]
fn test_attribution_keeps_counting_after_cancellation() {
    // A cancelled campaign's already-promised views are not retroactively
    // invalidated; only future guaranteed headroom is forfeited. Views that
    // land after cancellation fall into the no-active-campaign bonus path.
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 10);
    let engine = h.attribution();

    engine.record_card_display(&ViewEvent::game_display(Some(1), 7, owner));
    h.lifecycle().cancel_campaign(campaign, "done").unwrap();
    engine.record_card_display(&ViewEvent::game_display(Some(2), 7, owner));

    let row = h.campaign_row(campaign);
    assert_eq!(row.views_from_game, 1);
    assert_eq!(row.bonus_views, 1);
}
