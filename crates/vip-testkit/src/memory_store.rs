use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use vip_reconcile::{EntitlementRecord, EntitlementStore, PortError};

/// `EntitlementStore` backed by a `BTreeMap`, with failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, EntitlementRecord>>,
    fail_upsert: Mutex<BTreeSet<String>>,
    fail_reads: Mutex<bool>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a write.
    pub fn seed(&self, record: EntitlementRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.member_id.clone(), record);
    }

    pub fn record(&self, member_id: &str) -> Option<EntitlementRecord> {
        self.records.lock().unwrap().get(member_id).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, EntitlementRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Number of successful upserts since construction.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn fail_upsert_for(&self, member_id: &str) {
        self.fail_upsert
            .lock()
            .unwrap()
            .insert(member_id.to_string());
    }

    /// Make `get` and `list_all` fail with a transport error.
    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    fn check_reads(&self) -> Result<(), PortError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(PortError::Transport("store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EntitlementStore for MemoryStore {
    async fn get(&self, member_id: &str) -> Result<Option<EntitlementRecord>, PortError> {
        self.check_reads()?;
        Ok(self.record(member_id))
    }

    async fn upsert(&self, record: &EntitlementRecord) -> Result<(), PortError> {
        if self.fail_upsert.lock().unwrap().contains(&record.member_id) {
            return Err(PortError::Transport(format!(
                "upsert {} failed",
                record.member_id
            )));
        }
        self.seed(record.clone());
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<EntitlementRecord>, PortError> {
        self.check_reads()?;
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}
