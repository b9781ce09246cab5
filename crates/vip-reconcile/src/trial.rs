//! Trial lifecycle.
//!
//! A member's trial window is established once (on join, or lazily the first
//! time a reconciliation pass touches them) and never extended afterwards.
//! This module is the pure decision; persisting it is the engine's job.

use serde::{Deserialize, Serialize};

use crate::{Entitlement, EntitlementRecord, TRIAL_DURATION_MS};

/// What [`ensure_trial`] did to the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialChange {
    /// No record existed; a fresh trial was created.
    Created,
    /// The record had no trial; one was filled in. `vip_until` untouched.
    Backfilled,
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrialDecision {
    pub record: EntitlementRecord,
    pub change: TrialChange,
}

impl TrialDecision {
    /// `true` when the record must be written back.
    pub fn is_mutation(&self) -> bool {
        self.change != TrialChange::Unchanged
    }
}

/// End of a default trial for someone who joined at `joined_at_ms`
/// (`now_ms` when the join time is unknown).
pub fn default_trial_end(joined_at_ms: Option<i64>, now_ms: i64) -> i64 {
    joined_at_ms.unwrap_or(now_ms).saturating_add(TRIAL_DURATION_MS)
}

/// Ensure `member_id` has an established trial window.
///
/// - no record: `trial_until = vip_until = joined_at + 30d`
/// - record without trial: a still-running non-lifetime window becomes the
///   trial floor, otherwise `joined_at + 30d`
/// - record with trial: unchanged
pub fn ensure_trial(
    member_id: &str,
    existing: Option<&EntitlementRecord>,
    joined_at_ms: Option<i64>,
    now_ms: i64,
) -> TrialDecision {
    let Some(existing) = existing else {
        let end = default_trial_end(joined_at_ms, now_ms);
        return TrialDecision {
            record: EntitlementRecord::new(member_id, end, end),
            change: TrialChange::Created,
        };
    };

    if existing.has_trial() {
        return TrialDecision {
            record: existing.clone(),
            change: TrialChange::Unchanged,
        };
    }

    let trial_until_ms = match existing.entitlement() {
        Entitlement::Expiring(ts) if ts > now_ms => ts,
        _ => default_trial_end(joined_at_ms, now_ms),
    };

    TrialDecision {
        record: EntitlementRecord {
            member_id: existing.member_id.clone(),
            vip_until_ms: existing.vip_until_ms,
            trial_until_ms,
        },
        change: TrialChange::Backfilled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_750_000_000_000;

    #[test]
    fn unknown_join_time_falls_back_to_now() {
        assert_eq!(default_trial_end(None, NOW), NOW + TRIAL_DURATION_MS);
        assert_eq!(default_trial_end(Some(5), NOW), 5 + TRIAL_DURATION_MS);
    }

    #[test]
    fn decision_reports_mutation_only_when_changed() {
        let created = ensure_trial("1", None, None, NOW);
        assert!(created.is_mutation());

        let again = ensure_trial("1", Some(&created.record), None, NOW);
        assert!(!again.is_mutation());
        assert_eq!(again.record, created.record);
    }
}
