use crate::attribution::ViewEvent;
use std::collections::HashSet;
use std::sync::Mutex;
use viewmatrix_db::ViewKind;

/// Per-process "already seen this game session" cache.
///
/// Keyed by `(owner)` for whole-card displays and `(owner, card_instance)`
/// for flips, so one game session does not re-trigger attribution for the
/// same physical card slot before the ledger round-trip completes. Latency
/// optimization only; the View Ledger stays the source of truth.
#[derive(Debug, Default)]
pub struct SessionCache {
    seen: Mutex<HashSet<SessionKey>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SessionKey {
    Display { owner_id: i64 },
    Flip { owner_id: i64, card_instance: i64 },
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the session slot for an event. Returns false when the event was
    /// already processed this session and should be skipped. Events without
    /// a session identity (gallery flips carry no card instance) always pass.
    pub fn claim(&self, event: &ViewEvent) -> bool {
        let key = match event.kind {
            ViewKind::GameDisplay | ViewKind::CardBack => SessionKey::Display {
                owner_id: event.owner_id,
            },
            ViewKind::EyeballClick => match event.card_instance {
                Some(card_instance) => SessionKey::Flip {
                    owner_id: event.owner_id,
                    card_instance,
                },
                None => return true,
            },
        };

        match self.seen.lock() {
            Ok(mut seen) => seen.insert(key),
            // A poisoned cache only costs us the optimization
            Err(poisoned) => poisoned.into_inner().insert(key),
        }
    }

    /// Forget everything; called when a new game session starts.
    pub fn reset(&self) {
        match self.seen.lock() {
            Ok(mut seen) => seen.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}
