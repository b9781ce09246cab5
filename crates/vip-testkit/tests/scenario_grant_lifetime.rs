//! Scenario: Grant phase
//!
//! # Invariants under test
//!
//! 1. An approved member with no record gets the role and a lifetime record
//!    whose trial is backfilled from the join time.
//! 2. An existing trial is carried over untouched when lifetime is granted.
//! 3. An approved member missing from the platform is skipped, not an error.
//! 4. A member already holding the role with a lifetime record is not
//!    counted as a transition.

use vip_reconcile::{SyncPhase, VipStatus, LIFETIME_MS, TRIAL_DURATION_MS};
use vip_testkit::{rows, Harness, PlatformCall, VIP_ROLE};

const NOW: i64 = 1_750_000_000_000;
const DAY: i64 = 24 * 60 * 60 * 1000;

#[tokio::test]
async fn approved_member_without_record_becomes_lifetime() {
    let h = Harness::new(rows(&[&["discord_id", "lifetime_vip"], &["123", "YES"]]));
    let joined = NOW - DAY;
    h.platform.add_member("123", Some(joined), false);

    let outcome = h.engine.sync_at(NOW).await.unwrap();
    let summary = outcome.summary().expect("pass completed");

    assert_eq!(summary.lifetime_ensured, 1);
    assert_eq!(summary.roster_size, 1);
    assert!(summary.is_clean());
    assert!(h.platform.has_vip("123"));
    assert_eq!(
        h.platform.calls(),
        vec![PlatformCall::AddRole {
            member_id: "123".to_string(),
            role_id: VIP_ROLE.to_string(),
        }]
    );

    let rec = h.store.record("123").expect("record written");
    assert_eq!(rec.vip_until_ms, LIFETIME_MS);
    assert_eq!(rec.trial_until_ms, joined + TRIAL_DURATION_MS);

    assert_eq!(
        h.engine.status_at("123", NOW).await.unwrap(),
        VipStatus::Lifetime
    );
}

#[tokio::test]
async fn existing_trial_is_preserved_on_upgrade() {
    let h = Harness::new(rows(&[&["discord_id", "lifetime_vip"], &["7", "yes"]]));
    h.platform.add_member("7", Some(NOW - 3 * DAY), true);
    h.store
        .seed(vip_reconcile::EntitlementRecord::new("7", NOW + 27 * DAY, NOW + 27 * DAY));

    let summary = h.engine.sync_at(NOW).await.unwrap().summary().cloned().unwrap();

    assert_eq!(summary.lifetime_ensured, 1);
    assert!(h.platform.calls().is_empty(), "role already held");
    let rec = h.store.record("7").unwrap();
    assert_eq!(rec.vip_until_ms, LIFETIME_MS);
    assert_eq!(rec.trial_until_ms, NOW + 27 * DAY);
}

#[tokio::test]
async fn approved_member_not_on_platform_is_skipped() {
    let h = Harness::new(rows(&[
        &["discord_id", "lifetime_vip"],
        &["ghost", "YES"],
        &["123", "YES"],
    ]));
    h.platform.add_member("123", None, false);

    let summary = h.engine.sync_at(NOW).await.unwrap().summary().cloned().unwrap();

    assert_eq!(summary.members_missing, 1);
    assert_eq!(summary.lifetime_ensured, 1);
    assert!(summary.failures.is_empty());
    assert!(h.store.record("ghost").is_none());
    let rec = h.store.record("123").unwrap();
    assert_eq!(rec.trial_until_ms, NOW + TRIAL_DURATION_MS, "unknown join time uses now");
}

#[tokio::test]
async fn consistent_lifetime_member_is_not_a_transition() {
    let h = Harness::new(rows(&[&["discord_id", "lifetime_vip"], &["1", "YES"]]));
    h.platform.add_member("1", Some(NOW - DAY), true);
    h.store.seed(vip_reconcile::EntitlementRecord::new(
        "1",
        LIFETIME_MS,
        NOW + 29 * DAY,
    ));

    let summary = h.engine.sync_at(NOW).await.unwrap().summary().cloned().unwrap();

    assert_eq!(summary.transitions(), 0);
    assert_eq!(h.store.write_count(), 0);
    assert!(h.platform.calls().is_empty());
}

#[tokio::test]
async fn rejected_role_grant_leaves_record_untouched() {
    let h = Harness::new(rows(&[
        &["discord_id", "lifetime_vip"],
        &["bad", "YES"],
        &["good", "YES"],
    ]));
    h.platform.add_member("bad", Some(NOW), false);
    h.platform.add_member("good", Some(NOW), false);
    h.platform.reject_mutations_for("bad");

    let summary = h.engine.sync_at(NOW).await.unwrap().summary().cloned().unwrap();

    assert_eq!(summary.lifetime_ensured, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].member_id, "bad");
    assert_eq!(summary.failures[0].phase, SyncPhase::Grant);
    assert!(h.store.record("bad").is_none());
    assert_eq!(h.store.record("good").unwrap().vip_until_ms, LIFETIME_MS);
}
