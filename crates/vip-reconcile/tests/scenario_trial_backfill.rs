//! Scenario: Trial lifecycle
//!
//! # Invariants under test
//!
//! 1. No record → trial and vip both set to join + 30d (now + 30d if the
//!    join time is unknown).
//! 2. Record without a trial → backfilled; a running manual window becomes
//!    the trial floor; `vip_until` is never altered.
//! 3. Record with a trial → unchanged.
//! 4. Repeated calls after the first never mutate again.

use vip_reconcile::{
    ensure_trial, EntitlementRecord, TrialChange, LIFETIME_MS, TRIAL_DURATION_MS,
};

const NOW: i64 = 1_750_000_000_000;
const DAY: i64 = 24 * 60 * 60 * 1000;

#[test]
fn new_member_gets_thirty_days_from_join() {
    let joined = NOW - 2 * DAY;
    let d = ensure_trial("1", None, Some(joined), NOW);
    assert_eq!(d.change, TrialChange::Created);
    assert_eq!(d.record.trial_until_ms, joined + TRIAL_DURATION_MS);
    assert_eq!(d.record.vip_until_ms, joined + TRIAL_DURATION_MS);
}

#[test]
fn unknown_join_time_uses_now() {
    let d = ensure_trial("1", None, None, NOW);
    assert_eq!(d.record.trial_until_ms, NOW + TRIAL_DURATION_MS);
}

#[test]
fn running_manual_window_becomes_trial_floor() {
    let existing = EntitlementRecord::new("1", NOW + 10 * DAY, 0);
    let d = ensure_trial("1", Some(&existing), Some(NOW - 100 * DAY), NOW);
    assert_eq!(d.change, TrialChange::Backfilled);
    assert_eq!(d.record.trial_until_ms, NOW + 10 * DAY);
    assert_eq!(d.record.vip_until_ms, NOW + 10 * DAY);
}

#[test]
fn lifetime_member_backfills_from_join_and_keeps_lifetime() {
    let existing = EntitlementRecord::new("1", LIFETIME_MS, 0);
    let joined = NOW - 5 * DAY;
    let d = ensure_trial("1", Some(&existing), Some(joined), NOW);
    assert_eq!(d.change, TrialChange::Backfilled);
    assert_eq!(d.record.trial_until_ms, joined + TRIAL_DURATION_MS);
    assert_eq!(d.record.vip_until_ms, LIFETIME_MS);
}

#[test]
fn lapsed_manual_window_backfills_from_join() {
    let existing = EntitlementRecord::new("1", NOW - DAY, 0);
    let joined = NOW - 40 * DAY;
    let d = ensure_trial("1", Some(&existing), Some(joined), NOW);
    assert_eq!(d.record.trial_until_ms, joined + TRIAL_DURATION_MS);
    assert_eq!(d.record.vip_until_ms, NOW - DAY);
}

#[test]
fn established_trial_is_never_extended() {
    let existing = EntitlementRecord::new("1", 0, NOW - 3 * DAY);
    let d = ensure_trial("1", Some(&existing), Some(NOW), NOW);
    assert_eq!(d.change, TrialChange::Unchanged);
    assert_eq!(d.record, existing);
}

#[test]
fn repeated_calls_are_idempotent() {
    let first = ensure_trial("1", Some(&EntitlementRecord::new("1", 0, 0)), None, NOW);
    assert!(first.is_mutation());
    let second = ensure_trial("1", Some(&first.record), None, NOW + DAY);
    assert!(!second.is_mutation());
    assert_eq!(second.record, first.record);
}
