use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::guard::SyncGuard;
use crate::ports::{EntitlementStore, MemberPlatform, PortError, RosterSource};
use crate::roster::{parse_roster, EligibilityMap, RosterColumns, RosterSchemaError};
use crate::status::{classify, VipStatus};
use crate::trial::{self, TrialChange, TrialDecision};
use crate::{
    now_ms, Entitlement, EntitlementRecord, MemberFailure, PlatformMember, SyncOutcome, SyncPhase,
    SyncSummary,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Platform role that carries VIP.
    pub role_id: String,
    pub roster_columns: RosterColumns,
    /// Upper bound on in-flight member operations within one phase.
    pub member_concurrency: usize,
    /// Upper bound on one whole pass.
    pub pass_timeout: Duration,
}

impl EngineConfig {
    pub fn new(role_id: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            roster_columns: RosterColumns::default(),
            member_concurrency: 4,
            pass_timeout: Duration::from_secs(120),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Pass-level failure. Every variant aborts the pass before any mutation,
/// except `TimedOut`, which can interrupt a pass part-way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncError {
    Roster(PortError),
    Schema(RosterSchemaError),
    Store(PortError),
    Platform(PortError),
    RoleMissing { role_id: String },
    TimedOut { after_ms: u64 },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Roster(e) => write!(f, "roster read failed: {e}"),
            SyncError::Schema(e) => write!(f, "roster schema invalid: {e}"),
            SyncError::Store(e) => write!(f, "entitlement snapshot failed: {e}"),
            SyncError::Platform(e) => write!(f, "platform check failed: {e}"),
            SyncError::RoleMissing { role_id } => {
                write!(f, "vip role {role_id} not found on platform")
            }
            SyncError::TimedOut { after_ms } => {
                write!(f, "sync pass timed out after {after_ms}ms")
            }
        }
    }
}

impl std::error::Error for SyncError {}

// ---------------------------------------------------------------------------
// Per-member outcomes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GrantOutcome {
    Ensured,
    AlreadyConsistent,
    MemberMissing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DowngradeOutcome {
    /// Grace: role kept, `vip_until` lowered to the trial end.
    Demoted,
    Revoked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExpiryOutcome {
    RoleRemoved,
    NothingToDo,
}

/// Result of a membership-join event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinOutcome {
    pub change: TrialChange,
    pub status: VipStatus,
    pub role_granted: bool,
    /// Set when the record was saved but the role could not be added.
    pub role_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Orchestrates reconciliation passes, trial grants and status reads.
///
/// Cheap to clone; clones share the same collaborators and guard.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn EntitlementStore>,
    platform: Arc<dyn MemberPlatform>,
    roster: Arc<dyn RosterSource>,
    config: EngineConfig,
    guard: SyncGuard,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        platform: Arc<dyn MemberPlatform>,
        roster: Arc<dyn RosterSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            platform,
            roster,
            config,
            guard: SyncGuard::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    /// Guarded entry point used by every trigger (startup, timer, manual).
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.sync_at(now_ms()).await
    }

    /// [`Reconciler::sync`] with an explicit pass clock.
    pub async fn sync_at(&self, now_ms: i64) -> Result<SyncOutcome, SyncError> {
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("vip sync already running; trigger dropped");
            return Ok(SyncOutcome::Skipped);
        };

        let timeout = self.config.pass_timeout;
        match tokio::time::timeout(timeout, self.run_pass(now_ms)).await {
            Ok(Ok(summary)) => Ok(SyncOutcome::Completed(summary)),
            Ok(Err(e)) => {
                warn!(error = %e, "vip sync pass aborted");
                Err(e)
            }
            Err(_) => {
                let after_ms = timeout.as_millis() as u64;
                warn!(after_ms, "vip sync pass timed out");
                Err(SyncError::TimedOut { after_ms })
            }
        }
    }

    /// One unguarded pass: read roster + store snapshot, then grant,
    /// downgrade and expiry, strictly in that order.
    async fn run_pass(&self, now_ms: i64) -> Result<SyncSummary, SyncError> {
        let started = Instant::now();
        let mut summary = SyncSummary::new(Uuid::new_v4(), now_ms);
        let role_id = self.config.role_id.as_str();

        // --- Read phase: nothing below this block runs if any read fails ---
        let rows = self.roster.fetch_rows().await.map_err(SyncError::Roster)?;
        let eligibility =
            parse_roster(&rows, &self.config.roster_columns).map_err(SyncError::Schema)?;
        let snapshot: BTreeMap<String, EntitlementRecord> = self
            .store
            .list_all()
            .await
            .map_err(SyncError::Store)?
            .into_iter()
            .map(|r| (r.member_id.clone(), r))
            .collect();
        if !self
            .platform
            .role_exists(role_id)
            .await
            .map_err(SyncError::Platform)?
        {
            return Err(SyncError::RoleMissing {
                role_id: role_id.to_string(),
            });
        }
        summary.roster_size = eligibility.len();

        debug!(
            pass_id = %summary.pass_id,
            roster_size = summary.roster_size,
            stored = snapshot.len(),
            "vip sync snapshots loaded"
        );

        // --- 1) Grant ---
        let snap = &snapshot;
        let approved: Vec<String> = eligibility.approved_ids().map(str::to_string).collect();
        let results = for_each_member(approved, self.concurrency(), |id: String| async move {
            self.grant_member(&id, snap.get(&id), now_ms).await
        })
        .await;
        for (id, res) in results {
            match res {
                Ok(GrantOutcome::Ensured) => summary.lifetime_ensured += 1,
                Ok(GrantOutcome::AlreadyConsistent) => {}
                Ok(GrantOutcome::MemberMissing) => summary.members_missing += 1,
                Err(e) => record_failure(&mut summary, &id, SyncPhase::Grant, e),
            }
        }

        // --- 2) Downgrade (stored lifetime, no longer approved) ---
        let revoked = downgrade_candidates(snap, &eligibility);
        let results = for_each_member(revoked, self.concurrency(), |id: String| async move {
            self.downgrade_member(&snap[id.as_str()], now_ms).await
        })
        .await;
        for (id, res) in results {
            match res {
                Ok(DowngradeOutcome::Demoted) | Ok(DowngradeOutcome::Revoked) => {
                    summary.lifetime_downgraded += 1
                }
                Err(e) => record_failure(&mut summary, &id, SyncPhase::Downgrade, e),
            }
        }

        // --- 3) Expiry (reads the pre-pass snapshot) ---
        let lapsed = expiry_candidates(snap, &eligibility, now_ms);
        let results = for_each_member(lapsed, self.concurrency(), |id: String| async move {
            self.expire_member(&id).await
        })
        .await;
        for (id, res) in results {
            match res {
                Ok(ExpiryOutcome::RoleRemoved) => summary.expired_removed += 1,
                Ok(ExpiryOutcome::NothingToDo) => {}
                Err(e) => record_failure(&mut summary, &id, SyncPhase::Expiry, e),
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            pass_id = %summary.pass_id,
            roster_size = summary.roster_size,
            lifetime_ensured = summary.lifetime_ensured,
            lifetime_downgraded = summary.lifetime_downgraded,
            expired_removed = summary.expired_removed,
            members_missing = summary.members_missing,
            failures = summary.failures.len(),
            elapsed_ms = summary.elapsed_ms,
            "vip sync pass complete"
        );
        Ok(summary)
    }

    fn concurrency(&self) -> usize {
        self.config.member_concurrency.max(1)
    }

    async fn grant_member(
        &self,
        member_id: &str,
        stored: Option<&EntitlementRecord>,
        now_ms: i64,
    ) -> Result<GrantOutcome, PortError> {
        let role_id = self.config.role_id.as_str();
        let Some(member) = self.platform.fetch_member(member_id).await? else {
            debug!(member_id, "approved member not on platform; skipped");
            return Ok(GrantOutcome::MemberMissing);
        };

        let mut changed = false;
        if !member.has_role(role_id) {
            self.platform.add_role(member_id, role_id).await?;
            changed = true;
        }

        let trial = trial::ensure_trial(member_id, stored, member.joined_at_ms, now_ms);
        let target = trial.record.with_entitlement(Entitlement::Lifetime);
        if stored != Some(&target) {
            self.store.upsert(&target).await?;
            changed = true;
        }

        Ok(if changed {
            GrantOutcome::Ensured
        } else {
            GrantOutcome::AlreadyConsistent
        })
    }

    async fn downgrade_member(
        &self,
        stored: &EntitlementRecord,
        now_ms: i64,
    ) -> Result<DowngradeOutcome, PortError> {
        let role_id = self.config.role_id.as_str();
        let member_id = stored.member_id.as_str();

        // Backfill needs the join time; a member who left gets no trial.
        let mut looked_up: Option<Option<PlatformMember>> = None;
        let mut record = stored.clone();
        if !record.has_trial() {
            let member = self.platform.fetch_member(member_id).await?;
            if let Some(m) = &member {
                record = trial::ensure_trial(member_id, Some(&record), m.joined_at_ms, now_ms).record;
            }
            looked_up = Some(member);
        }

        if record.trial_until_ms > now_ms {
            let target = record.with_entitlement(Entitlement::Expiring(record.trial_until_ms));
            self.store.upsert(&target).await?;
            debug!(member_id, trial_until_ms = record.trial_until_ms, "lifetime demoted to trial");
            return Ok(DowngradeOutcome::Demoted);
        }

        let member = match looked_up {
            Some(m) => m,
            None => self.platform.fetch_member(member_id).await?,
        };
        if member.is_some_and(|m| m.has_role(role_id)) {
            self.platform.remove_role(member_id, role_id).await?;
        }
        self.store
            .upsert(&record.with_entitlement(Entitlement::None))
            .await?;
        debug!(member_id, "lifetime revoked");
        Ok(DowngradeOutcome::Revoked)
    }

    async fn expire_member(&self, member_id: &str) -> Result<ExpiryOutcome, PortError> {
        let role_id = self.config.role_id.as_str();
        match self.platform.fetch_member(member_id).await? {
            Some(m) if m.has_role(role_id) => {
                self.platform.remove_role(member_id, role_id).await?;
                debug!(member_id, "expired vip role removed");
                Ok(ExpiryOutcome::RoleRemoved)
            }
            _ => Ok(ExpiryOutcome::NothingToDo),
        }
    }

    // -----------------------------------------------------------------------
    // Trial lifecycle + join
    // -----------------------------------------------------------------------

    /// Load, decide and persist a member's trial window.
    pub async fn ensure_trial(
        &self,
        member_id: &str,
        joined_at_ms: Option<i64>,
        now_ms: i64,
    ) -> Result<TrialDecision, PortError> {
        let existing = self.store.get(member_id).await?;
        let decision = trial::ensure_trial(member_id, existing.as_ref(), joined_at_ms, now_ms);
        if decision.is_mutation() {
            self.store.upsert(&decision.record).await?;
        }
        Ok(decision)
    }

    pub async fn handle_member_join(
        &self,
        member_id: &str,
        joined_at_ms: Option<i64>,
    ) -> Result<JoinOutcome, PortError> {
        self.handle_member_join_at(member_id, joined_at_ms, now_ms())
            .await
    }

    /// Grant (or re-confirm) the join trial and give the role while the
    /// member is still entitled.
    pub async fn handle_member_join_at(
        &self,
        member_id: &str,
        joined_at_ms: Option<i64>,
        now_ms: i64,
    ) -> Result<JoinOutcome, PortError> {
        let decision = self.ensure_trial(member_id, joined_at_ms, now_ms).await?;
        let status = classify(Some(&decision.record), now_ms);

        let mut outcome = JoinOutcome {
            change: decision.change,
            status,
            role_granted: false,
            role_error: None,
        };
        if !decision.record.entitlement().is_active_at(now_ms) {
            return Ok(outcome);
        }

        match self.platform.add_role(member_id, &self.config.role_id).await {
            Ok(()) => outcome.role_granted = true,
            Err(e) => {
                warn!(member_id, error = %e, "join trial saved but role grant failed");
                outcome.role_error = Some(e.to_string());
            }
        }
        info!(member_id, change = ?outcome.change, "member join handled");
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub async fn status(&self, member_id: &str) -> Result<VipStatus, PortError> {
        self.status_at(member_id, now_ms()).await
    }

    pub async fn status_at(&self, member_id: &str, now_ms: i64) -> Result<VipStatus, PortError> {
        crate::status::query_status(self.store.as_ref(), member_id, now_ms).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stored lifetime records whose member is absent from, or not approved in,
/// this pass's roster.
fn downgrade_candidates(
    snapshot: &BTreeMap<String, EntitlementRecord>,
    eligibility: &EligibilityMap,
) -> Vec<String> {
    snapshot
        .values()
        .filter(|r| r.entitlement().is_lifetime() && !eligibility.is_approved(&r.member_id))
        .map(|r| r.member_id.clone())
        .collect()
}

/// Stored non-lifetime windows already lapsed at pass start. Members approved
/// this pass were just re-granted and are left alone.
fn expiry_candidates(
    snapshot: &BTreeMap<String, EntitlementRecord>,
    eligibility: &EligibilityMap,
    now_ms: i64,
) -> Vec<String> {
    snapshot
        .values()
        .filter(|r| r.entitlement().is_lapsed_at(now_ms) && !eligibility.is_approved(&r.member_id))
        .map(|r| r.member_id.clone())
        .collect()
}

/// Run `f` for every id with at most `concurrency` in flight. Completes the
/// whole batch before returning so phases never overlap.
///
/// Ids are owned so the per-member futures carry no borrow of them; the
/// pass future stays `Send` and can be spawned.
async fn for_each_member<T, F, Fut>(
    ids: Vec<String>,
    concurrency: usize,
    f: F,
) -> Vec<(String, Result<T, PortError>)>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, PortError>>,
{
    stream::iter(ids)
        .map(|id| {
            let fut = f(id.clone());
            async move { (id, fut.await) }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await
}

fn record_failure(summary: &mut SyncSummary, member_id: &str, phase: SyncPhase, e: PortError) {
    warn!(
        pass_id = %summary.pass_id,
        member_id,
        phase = phase.as_str(),
        error = %e,
        "member skipped this pass"
    );
    summary.failures.push(MemberFailure {
        member_id: member_id.to_string(),
        phase,
        error: e.to_string(),
    });
}
