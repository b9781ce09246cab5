use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel expiry for permanent entitlement: 9999-12-31T00:00:00Z in epoch ms.
///
/// Any persisted `vip_until_ms` at or above this value is lifetime VIP.
pub const LIFETIME_MS: i64 = 253_402_214_400_000;

/// Length of the one-time trial window granted on join (30 days).
pub const TRIAL_DURATION_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Decoded form of a persisted `vip_until_ms`.
///
/// The store keeps the legacy numeric column; everything in memory goes
/// through this enum so the lifetime sentinel is never compared by hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "until_ms", rename_all = "snake_case")]
pub enum Entitlement {
    None,
    Expiring(i64),
    Lifetime,
}

impl Entitlement {
    pub fn from_vip_until(vip_until_ms: i64) -> Self {
        if vip_until_ms <= 0 {
            Entitlement::None
        } else if vip_until_ms >= LIFETIME_MS {
            Entitlement::Lifetime
        } else {
            Entitlement::Expiring(vip_until_ms)
        }
    }

    pub fn to_vip_until(self) -> i64 {
        match self {
            Entitlement::None => 0,
            Entitlement::Expiring(ts) => ts,
            Entitlement::Lifetime => LIFETIME_MS,
        }
    }

    pub fn is_lifetime(&self) -> bool {
        matches!(self, Entitlement::Lifetime)
    }

    /// `true` when the entitlement still grants the role at `now_ms`.
    pub fn is_active_at(&self, now_ms: i64) -> bool {
        match self {
            Entitlement::None => false,
            Entitlement::Expiring(ts) => *ts > now_ms,
            Entitlement::Lifetime => true,
        }
    }

    /// `true` for a non-lifetime window that has already lapsed at `now_ms`.
    pub fn is_lapsed_at(&self, now_ms: i64) -> bool {
        matches!(self, Entitlement::Expiring(ts) if *ts <= now_ms)
    }
}

/// One persisted row per member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub member_id: String,
    pub vip_until_ms: i64,
    /// `0` means no trial has been established yet.
    pub trial_until_ms: i64,
}

impl EntitlementRecord {
    pub fn new(member_id: impl Into<String>, vip_until_ms: i64, trial_until_ms: i64) -> Self {
        Self {
            member_id: member_id.into(),
            vip_until_ms,
            trial_until_ms,
        }
    }

    pub fn entitlement(&self) -> Entitlement {
        Entitlement::from_vip_until(self.vip_until_ms)
    }

    pub fn has_trial(&self) -> bool {
        self.trial_until_ms != 0
    }

    pub fn with_entitlement(&self, entitlement: Entitlement) -> Self {
        Self {
            member_id: self.member_id.clone(),
            vip_until_ms: entitlement.to_vip_until(),
            trial_until_ms: self.trial_until_ms,
        }
    }
}

/// A live community member as seen by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformMember {
    pub member_id: String,
    pub joined_at_ms: Option<i64>,
    pub role_ids: Vec<String>,
}

impl PlatformMember {
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_ids.iter().any(|r| r == role_id)
    }
}

/// Phase of a reconciliation pass, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Grant,
    Downgrade,
    Expiry,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Grant => "grant",
            SyncPhase::Downgrade => "downgrade",
            SyncPhase::Expiry => "expiry",
        }
    }
}

/// A member whose unit of work failed. The pass continued without them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFailure {
    pub member_id: String,
    pub phase: SyncPhase,
    pub error: String,
}

/// Counts reported by one completed pass.
///
/// Counters only move on an actual transition, so a pass over already
/// consistent state reports all zeros.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub pass_id: Uuid,
    pub started_at_ms: i64,
    pub lifetime_ensured: usize,
    pub lifetime_downgraded: usize,
    pub expired_removed: usize,
    /// Approved roster entries with no live member on the platform.
    pub members_missing: usize,
    pub roster_size: usize,
    pub elapsed_ms: u64,
    pub failures: Vec<MemberFailure>,
}

impl SyncSummary {
    pub fn new(pass_id: Uuid, started_at_ms: i64) -> Self {
        Self {
            pass_id,
            started_at_ms,
            lifetime_ensured: 0,
            lifetime_downgraded: 0,
            expired_removed: 0,
            members_missing: 0,
            roster_size: 0,
            elapsed_ms: 0,
            failures: Vec::new(),
        }
    }

    pub fn transitions(&self) -> usize {
        self.lifetime_ensured + self.lifetime_downgraded + self.expired_removed
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a call to the guarded sync entry point did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncSummary),
    /// Another pass held the guard; nothing ran.
    Skipped,
}

impl SyncOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped)
    }

    pub fn summary(&self) -> Option<&SyncSummary> {
        match self {
            SyncOutcome::Completed(s) => Some(s),
            SyncOutcome::Skipped => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_and_zero_decode_to_explicit_variants() {
        assert_eq!(Entitlement::from_vip_until(0), Entitlement::None);
        assert_eq!(Entitlement::from_vip_until(LIFETIME_MS), Entitlement::Lifetime);
        assert_eq!(
            Entitlement::from_vip_until(LIFETIME_MS + 1),
            Entitlement::Lifetime
        );
        assert_eq!(
            Entitlement::from_vip_until(1_700_000_000_000),
            Entitlement::Expiring(1_700_000_000_000)
        );
    }

    #[test]
    fn expiring_window_is_active_only_before_its_end() {
        let e = Entitlement::Expiring(1_000);
        assert!(e.is_active_at(999));
        assert!(!e.is_active_at(1_000));
        assert!(e.is_lapsed_at(1_000));
        assert!(!Entitlement::Lifetime.is_lapsed_at(i64::MAX));
        assert!(!Entitlement::None.is_lapsed_at(0));
    }
}
