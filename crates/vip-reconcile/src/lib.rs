//! vip-reconcile
//!
//! VIP reconciliation engine.
//!
//! Keeps three sources consistent:
//! - the external approval roster (lifetime VIP),
//! - the platform's live role assignments,
//! - the local entitlement store (lifetime / trial windows).
//!
//! A pass reads one roster snapshot and one store snapshot, then runs
//! grant → downgrade → expiry. Passes are single-flight; overlapping triggers
//! are dropped. A failure on one member never aborts the pass.
//!
//! Collaborators are reached only through the traits in [`ports`].

mod engine;
pub mod guard;
pub mod ports;
pub mod roster;
pub mod status;
pub mod trial;
mod types;

pub use engine::{EngineConfig, JoinOutcome, Reconciler, SyncError};
pub use guard::{SyncGuard, SyncPermit};
pub use ports::{EntitlementStore, MemberPlatform, PortError, RosterSource};
pub use roster::{parse_roster, EligibilityMap, RosterColumns, RosterSchemaError};
pub use status::{classify, VipStatus};
pub use trial::{ensure_trial, TrialChange, TrialDecision};
pub use types::*;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
