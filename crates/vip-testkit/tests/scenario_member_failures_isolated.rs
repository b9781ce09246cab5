//! Scenario: One bad member never aborts the pass
//!
//! # Invariants under test
//!
//! 1. A lookup failure, a rejected role change, or a failed store write is
//!    reported per member in `SyncSummary::failures`.
//! 2. Every other member in every phase is still processed.

use vip_reconcile::{EngineConfig, EntitlementRecord, SyncPhase, LIFETIME_MS};
use vip_testkit::{rows, Harness, VIP_ROLE};

const NOW: i64 = 1_750_000_000_000;
const DAY: i64 = 24 * 60 * 60 * 1000;

#[tokio::test]
async fn failures_are_collected_and_pass_continues() {
    let mut config = EngineConfig::new(VIP_ROLE);
    config.member_concurrency = 1;
    let h = Harness::with_config(
        rows(&[
            &["discord_id", "lifetime_vip"],
            &["lookup-fails", "YES"],
            &["write-fails", "YES"],
            &["ok", "YES"],
        ]),
        config,
    );
    h.platform.add_member("lookup-fails", None, false);
    h.platform.add_member("write-fails", None, false);
    h.platform.add_member("ok", None, false);
    h.platform.add_member("revoked", None, true);
    h.platform.add_member("remove-fails", None, true);
    h.platform.add_member("lapsed", None, true);

    h.platform.fail_lookup_for("lookup-fails");
    h.store.fail_upsert_for("write-fails");
    h.platform.reject_mutations_for("remove-fails");

    h.store.seed(EntitlementRecord::new("revoked", LIFETIME_MS, NOW - DAY));
    h.store
        .seed(EntitlementRecord::new("remove-fails", NOW - DAY, NOW - DAY));
    h.store.seed(EntitlementRecord::new("lapsed", NOW - DAY, NOW - DAY));

    let summary = h.engine.sync_at(NOW).await.unwrap().summary().cloned().unwrap();

    let mut failed: Vec<(String, SyncPhase)> = summary
        .failures
        .iter()
        .map(|f| (f.member_id.clone(), f.phase))
        .collect();
    failed.sort();
    assert_eq!(
        failed,
        vec![
            ("lookup-fails".to_string(), SyncPhase::Grant),
            ("remove-fails".to_string(), SyncPhase::Expiry),
            ("write-fails".to_string(), SyncPhase::Grant),
        ]
    );
    assert!(!summary.is_clean());

    assert_eq!(summary.lifetime_ensured, 1);
    assert_eq!(summary.lifetime_downgraded, 1);
    assert_eq!(summary.expired_removed, 1);
    assert_eq!(h.store.record("ok").unwrap().vip_until_ms, LIFETIME_MS);
    assert!(!h.platform.has_vip("revoked"));
    assert!(!h.platform.has_vip("lapsed"));
    assert!(h.platform.has_vip("remove-fails"));
}
