use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use vip_reconcile::{MemberPlatform, PlatformMember, PortError};

/// A role mutation observed by [`FakePlatform`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    AddRole { member_id: String, role_id: String },
    RemoveRole { member_id: String, role_id: String },
}

/// Start or end of one `fetch_member` call, in observed order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupEvent {
    Started(String),
    Finished(String),
}

/// In-memory community with one VIP role.
///
/// Role mutations update the member's role list so later lookups observe
/// them, the way the real platform does.
#[derive(Debug)]
pub struct FakePlatform {
    role_id: String,
    role_present: Mutex<bool>,
    members: Mutex<BTreeMap<String, PlatformMember>>,
    reject_mutations: Mutex<BTreeSet<String>>,
    fail_lookups: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<PlatformCall>>,
    lookups: Mutex<usize>,
    lookup_delay: Mutex<Duration>,
    lookup_events: Mutex<Vec<LookupEvent>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakePlatform {
    pub fn new(role_id: &str) -> Self {
        Self {
            role_id: role_id.to_string(),
            role_present: Mutex::new(true),
            members: Mutex::new(BTreeMap::new()),
            reject_mutations: Mutex::new(BTreeSet::new()),
            fail_lookups: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(Vec::new()),
            lookups: Mutex::new(0),
            lookup_delay: Mutex::new(Duration::ZERO),
            lookup_events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn add_member(&self, member_id: &str, joined_at_ms: Option<i64>, has_vip: bool) {
        let role_ids = if has_vip {
            vec![self.role_id.clone()]
        } else {
            Vec::new()
        };
        self.members.lock().unwrap().insert(
            member_id.to_string(),
            PlatformMember {
                member_id: member_id.to_string(),
                joined_at_ms,
                role_ids,
            },
        );
    }

    pub fn has_vip(&self, member_id: &str) -> bool {
        self.members
            .lock()
            .unwrap()
            .get(member_id)
            .is_some_and(|m| m.has_role(&self.role_id))
    }

    pub fn set_role_present(&self, present: bool) {
        *self.role_present.lock().unwrap() = present;
    }

    /// Role add/remove for this member will be refused.
    pub fn reject_mutations_for(&self, member_id: &str) {
        self.reject_mutations
            .lock()
            .unwrap()
            .insert(member_id.to_string());
    }

    /// Lookups for this member fail with a transport error.
    pub fn fail_lookup_for(&self, member_id: &str) {
        self.fail_lookups
            .lock()
            .unwrap()
            .insert(member_id.to_string());
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> usize {
        *self.lookups.lock().unwrap()
    }

    /// Every `fetch_member` sleeps this long, so concurrent lookups overlap.
    pub fn set_lookup_delay(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = delay;
    }

    pub fn lookup_events(&self) -> Vec<LookupEvent> {
        self.lookup_events.lock().unwrap().clone()
    }

    /// Highest number of `fetch_member` calls observed in flight at once.
    pub fn peak_lookups_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn mutate(&self, call: PlatformCall) -> Result<(), PortError> {
        let (member_id, role_id, add) = match &call {
            PlatformCall::AddRole { member_id, role_id } => (member_id, role_id, true),
            PlatformCall::RemoveRole { member_id, role_id } => (member_id, role_id, false),
        };
        if self.reject_mutations.lock().unwrap().contains(member_id) {
            return Err(PortError::Rejected {
                status: Some(403),
                message: "Missing Permissions".to_string(),
            });
        }

        let mut members = self.members.lock().unwrap();
        let Some(member) = members.get_mut(member_id) else {
            return Err(PortError::Rejected {
                status: Some(404),
                message: "Unknown Member".to_string(),
            });
        };
        member.role_ids.retain(|r| r != role_id);
        if add {
            member.role_ids.push(role_id.clone());
        }
        drop(members);

        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl MemberPlatform for FakePlatform {
    async fn role_exists(&self, role_id: &str) -> Result<bool, PortError> {
        Ok(*self.role_present.lock().unwrap() && role_id == self.role_id)
    }

    async fn fetch_member(&self, member_id: &str) -> Result<Option<PlatformMember>, PortError> {
        *self.lookups.lock().unwrap() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.lookup_events
            .lock()
            .unwrap()
            .push(LookupEvent::Started(member_id.to_string()));

        let delay = *self.lookup_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_lookups.lock().unwrap().contains(member_id) {
            Err(PortError::Transport("gateway timeout".to_string()))
        } else {
            Ok(self.members.lock().unwrap().get(member_id).cloned())
        };

        self.lookup_events
            .lock()
            .unwrap()
            .push(LookupEvent::Finished(member_id.to_string()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn add_role(&self, member_id: &str, role_id: &str) -> Result<(), PortError> {
        self.mutate(PlatformCall::AddRole {
            member_id: member_id.to_string(),
            role_id: role_id.to_string(),
        })
    }

    async fn remove_role(&self, member_id: &str, role_id: &str) -> Result<(), PortError> {
        self.mutate(PlatformCall::RemoveRole {
            member_id: member_id.to_string(),
            role_id: role_id.to_string(),
        })
    }
}
