#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use viewmatrix_db::{Campaign, EngineDatabase, MatrixEntry, Notification, NotificationKind};
use viewmatrix_engine::{
    AttributionEngine, EngineConfig, LifecycleEngine, PlacementEngine, SharedDatabase,
};

/// Shared fixture: one in-memory store plus engine constructors.
pub struct Harness {
    pub db: SharedDatabase,
    pub config: EngineConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let db = Arc::new(Mutex::new(EngineDatabase::create_in_memory().unwrap()));
        Self { db, config }
    }

    pub fn attribution(&self) -> AttributionEngine {
        AttributionEngine::new(Arc::clone(&self.db), &self.config)
    }

    pub fn lifecycle(&self) -> LifecycleEngine {
        LifecycleEngine::new(Arc::clone(&self.db))
    }

    pub fn placement(&self) -> PlacementEngine {
        PlacementEngine::new(Arc::clone(&self.db), &self.config)
    }

    pub fn participant(&self, username: &str) -> i64 {
        self.db
            .lock()
            .unwrap()
            .create_participant(username)
            .unwrap()
            .id
    }

    pub fn campaign(&self, owner_id: i64, views_guaranteed: u64) -> i64 {
        self.db
            .lock()
            .unwrap()
            .create_campaign(owner_id, views_guaranteed)
            .unwrap()
            .id
    }

    pub fn campaign_row(&self, id: i64) -> Campaign {
        self.db.lock().unwrap().campaign(id).unwrap().unwrap()
    }

    pub fn active_entry(&self, owner_id: i64) -> MatrixEntry {
        self.db
            .lock()
            .unwrap()
            .active_entry_for_owner(owner_id)
            .unwrap()
            .unwrap()
    }

    pub fn entry_row(&self, id: i64) -> MatrixEntry {
        self.db.lock().unwrap().matrix_entry(id).unwrap().unwrap()
    }

    pub fn referral_count(&self, participant_id: i64) -> u64 {
        self.db
            .lock()
            .unwrap()
            .participant(participant_id)
            .unwrap()
            .unwrap()
            .referral_count
    }

    pub fn notifications(&self, recipient_id: i64) -> Vec<Notification> {
        self.db
            .lock()
            .unwrap()
            .notifications_for(recipient_id)
            .unwrap()
    }

    pub fn notifications_of_kind(&self, recipient_id: i64, kind: NotificationKind) -> usize {
        self.notifications(recipient_id)
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }
}
