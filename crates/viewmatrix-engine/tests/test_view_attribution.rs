mod common;

use common::Harness;
use viewmatrix_engine::{EngineConfig, OverCreditPolicy, ViewEvent};

#[test]
fn test_dedup_credits_guaranteed_at_most_once() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 10);
    let engine = h.attribution();

    let event = ViewEvent::game_display(Some(42), 7, owner);
    for _ in 0..5 {
        engine.record_card_display(&event);
    }

    let campaign = h.campaign_row(campaign);
    assert_eq!(campaign.views_from_game, 1);
    assert_eq!(campaign.bonus_views, 4);
}

#[test]
fn test_each_view_kind_credits_its_own_counter() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 10);
    let engine = h.attribution();

    // Distinct cards, so each event is a fresh dedup key
    engine.record_card_display(&ViewEvent::game_display(Some(42), 1, owner));
    engine.record_card_display(&ViewEvent::eyeball_click(Some(42), 2, owner));
    engine.record_card_display(&ViewEvent::card_back(Some(42), 3, owner));

    let campaign = h.campaign_row(campaign);
    assert_eq!(campaign.views_from_game, 1);
    assert_eq!(campaign.views_from_flips, 1);
    assert_eq!(campaign.views_from_card_back, 1);
    assert_eq!(campaign.bonus_views, 0);
    assert_eq!(campaign.total_counted_views(), 3);
}

#[test]
fn test_anonymous_viewers_are_always_bonus() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 10);
    let engine = h.attribution();

    for _ in 0..3 {
        engine.record_card_display(&ViewEvent::game_display(None, 7, owner));
    }

    let campaign = h.campaign_row(campaign);
    assert_eq!(campaign.total_counted_views(), 0);
    assert_eq!(campaign.bonus_views, 3);
}

#[test]
fn test_no_active_campaign_falls_back_to_most_recent() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let lifecycle = h.lifecycle();

    let first = h.campaign(owner, 10);
    lifecycle.cancel_campaign(first, "unused").unwrap();
    let second = h.campaign(owner, 10);
    lifecycle.cancel_campaign(second, "unused").unwrap();

    let engine = h.attribution();
    // Fresh viewers each time, yet nothing counts toward a quota
    engine.record_card_display(&ViewEvent::game_display(Some(1), 7, owner));
    engine.record_card_display(&ViewEvent::game_display(Some(2), 7, owner));

    let first = h.campaign_row(first);
    let second = h.campaign_row(second);
    assert_eq!(second.bonus_views, 2);
    assert_eq!(second.total_counted_views(), 0);
    assert_eq!(first.bonus_views, 0);
}

#[test]
fn test_owner_without_campaigns_is_a_noop() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let engine = h.attribution();

    // Must not error or panic; there is nothing to credit
    engine.record_card_display(&ViewEvent::game_display(Some(1), 7, owner));
}

#[test]
fn test_soft_policy_allows_over_credit() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 1);
    let engine = h.attribution();

    engine.record_card_display(&ViewEvent::game_display(Some(1), 7, owner));
    engine.record_card_display(&ViewEvent::game_display(Some(2), 7, owner));

    let campaign = h.campaign_row(campaign);
    assert_eq!(campaign.views_from_game, 2);
    assert_eq!(campaign.bonus_views, 0);
}

#[test]
fn test_cap_to_bonus_policy_redirects_over_credit() {
    let h = Harness::with_config(EngineConfig {
        over_credit: OverCreditPolicy::CapToBonus,
        ..EngineConfig::default()
    });
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 1);
    let engine = h.attribution();

    engine.record_card_display(&ViewEvent::game_display(Some(1), 7, owner));
    engine.record_card_display(&ViewEvent::game_display(Some(2), 7, owner));
    // The capped viewer left no ledger record, so they stay bonus on repeat
    engine.record_card_display(&ViewEvent::game_display(Some(2), 7, owner));

    let campaign = h.campaign_row(campaign);
    assert_eq!(campaign.views_from_game, 1);
    assert_eq!(campaign.bonus_views, 2);
}

#[test]
fn test_game_events_are_gated_per_session() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 10);
    let engine = h.attribution();

    let event = ViewEvent::game_display(Some(42), 7, owner);
    engine.record_game_event(&event);
    engine.record_game_event(&event);
    engine.record_game_event(&event);

    let row = h.campaign_row(campaign);
    assert_eq!(row.views_from_game, 1);
    assert_eq!(row.bonus_views, 0);

    // A new session reaches the ledger again; the ledger stays in charge of
    // dedup and turns the repeat into a bonus view
    engine.reset_session();
    engine.record_game_event(&event);

    let row = h.campaign_row(campaign);
    assert_eq!(row.views_from_game, 1);
    assert_eq!(row.bonus_views, 1);
}

#[test]
fn test_flips_are_gated_per_card_instance() {
    let h = Harness::new();
    let owner = h.participant("alice");
    let campaign = h.campaign(owner, 10);
    let engine = h.attribution();

    // Same physical slot flipped twice: one attribution. A second slot
    // showing the same card reaches the ledger and dedups to bonus.
    engine.record_game_event(&ViewEvent::flip(Some(42), 7, owner, 0));
    engine.record_game_event(&ViewEvent::flip(Some(42), 7, owner, 0));
    engine.record_game_event(&ViewEvent::flip(Some(42), 7, owner, 1));

    let row = h.campaign_row(campaign);
    assert_eq!(row.views_from_flips, 1);
    assert_eq!(row.bonus_views, 1);
}
