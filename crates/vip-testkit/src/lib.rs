//! vip-testkit
//!
//! In-memory collaborators for exercising the reconciliation engine without a
//! database, a chat platform or a spreadsheet. Scenario tests for the engine
//! live under `tests/`.

mod memory_store;
mod platform;
mod roster;

pub use memory_store::MemoryStore;
pub use platform::{FakePlatform, LookupEvent, PlatformCall};
pub use roster::{GatedRoster, StaticRoster};

use std::sync::Arc;

use vip_reconcile::{EngineConfig, Reconciler};

/// Role id used by [`Harness`].
pub const VIP_ROLE: &str = "vip-role";

/// Build roster rows from string literals.
pub fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
    raw.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

/// Engine wired to in-memory doubles, with handles kept for assertions.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub platform: Arc<FakePlatform>,
    pub roster: Arc<StaticRoster>,
    pub engine: Reconciler,
}

impl Harness {
    pub fn new(roster_rows: Vec<Vec<String>>) -> Self {
        Self::with_config(roster_rows, EngineConfig::new(VIP_ROLE))
    }

    pub fn with_config(roster_rows: Vec<Vec<String>>, config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let platform = Arc::new(FakePlatform::new(&config.role_id));
        let roster = Arc::new(StaticRoster::new(roster_rows));
        let engine = Reconciler::new(store.clone(), platform.clone(), roster.clone(), config);
        Self {
            store,
            platform,
            roster,
            engine,
        }
    }
}
