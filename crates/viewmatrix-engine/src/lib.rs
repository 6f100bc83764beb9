/*!
# ViewMatrix Engines

The decision-making core of the ViewMatrix platform, in three parts:

- [`AttributionEngine`](attribution::AttributionEngine): decides whether a
  displayed promotional card counts toward a paying campaign's contracted
  quota or is discarded as a non-billable bonus impression. Best-effort by
  contract; failures are logged and the event is dropped.
- [`LifecycleEngine`](lifecycle::LifecycleEngine): the campaign state
  machine (`queued -> active -> {completed, cancelled}`) including
  forfeiture on early cancellation.
- [`PlacementEngine`](placement::PlacementEngine): places a newly-joined
  participant into the shared 6-slot referral tree, detects completion, and
  appends payout/growth notifications to the outbox.

The engines share one [`EngineDatabase`] behind a mutex. The mutex only
serializes access to the SQLite connection; correctness comes from the
store's conditional updates, so multiple processes can share the database
file without double-crediting a view or double-assigning a slot.

## Quick Start

```no_run
use std::sync::{Arc, Mutex};
use viewmatrix_db::EngineDatabase;
use viewmatrix_engine::{AttributionEngine, EngineConfig, PlacementEngine, ViewEvent};

# fn example() -> Result<(), Box<dyn std::error::Error>> {
let db = Arc::new(Mutex::new(EngineDatabase::create_in_memory()?));
let config = EngineConfig::default();

let attribution = AttributionEngine::new(Arc::clone(&db), &config);
attribution.record_card_display(&ViewEvent::game_display(Some(42), 7, 1));

let placement = PlacementEngine::new(Arc::clone(&db), &config);
let outcome = placement.join_matrix(2, 11, Some("alice"))?;
println!("placed: {} spot: {:?}", outcome.placed, outcome.spot);
# Ok(())
# }
```
*/

pub mod attribution;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod notifications;
pub mod placement;
mod session;

pub use attribution::{AttributionEngine, ViewEvent};
pub use config::{EngineConfig, OverCreditPolicy};
pub use error::{JoinError, JoinResult, LifecycleError, LifecycleResult};
pub use lifecycle::{is_quota_met, LifecycleEngine};
pub use placement::{JoinOutcome, PlacementEngine};
pub use session::SessionCache;

use std::sync::{Arc, Mutex, MutexGuard};
use viewmatrix_db::{DbError, DbResult, EngineDatabase};

/// The store handle the engines share.
pub type SharedDatabase = Arc<Mutex<EngineDatabase>>;

pub(crate) fn lock_db(db: &SharedDatabase) -> DbResult<MutexGuard<'_, EngineDatabase>> {
    db.lock()
        .map_err(|_| DbError::Connection("database mutex poisoned".to_string()))
}
