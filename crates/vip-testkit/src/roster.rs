use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use vip_reconcile::{PortError, RosterSource};

/// Roster that returns whatever it was last given.
#[derive(Debug)]
pub struct StaticRoster {
    rows: Mutex<Result<Vec<Vec<String>>, PortError>>,
}

impl StaticRoster {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(Ok(rows)),
        }
    }

    pub fn set_rows(&self, rows: Vec<Vec<String>>) {
        *self.rows.lock().unwrap() = Ok(rows);
    }

    pub fn set_error(&self, err: PortError) {
        *self.rows.lock().unwrap() = Err(err);
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, PortError> {
        self.rows.lock().unwrap().clone()
    }
}

/// Roster whose fetch parks until released, to hold a pass open.
///
/// `entered` is notified when a fetch starts; the fetch returns once
/// `release` is notified.
#[derive(Debug, Default)]
pub struct GatedRoster {
    rows: Vec<Vec<String>>,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedRoster {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl RosterSource for GatedRoster {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, PortError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.rows.clone())
    }
}
