//! Roster reader for a spreadsheet published as CSV (e.g. a Google Sheets
//! `export?format=csv` link). Rows are returned verbatim; header handling
//! belongs to `vip_reconcile::parse_roster`.

use std::time::Duration;

use async_trait::async_trait;
use vip_reconcile::{PortError, RosterSource};

#[derive(Clone, Debug)]
pub struct SheetRoster {
    http: reqwest::Client,
    url: String,
}

impl SheetRoster {
    pub fn new(url: impl Into<String>) -> Result<Self, PortError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PortError::Transport(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RosterSource for SheetRoster {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, PortError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "roster fetch returned status {}",
                status.as_u16()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;

        let rows = parse_csv_rows(&body)?;
        tracing::debug!(rows = rows.len(), "roster fetched");
        Ok(rows)
    }
}

/// Split CSV text into rows of cells. Quoted fields and ragged rows are
/// accepted; blank lines are dropped.
pub fn parse_csv_rows(src: &str) -> Result<Vec<Vec<String>>, PortError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(src.as_bytes());

    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| PortError::Decode(format!("roster csv: {e}")))?;
        if rec.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        out.push(rec.iter().map(str::to_string).collect());
    }
    Ok(out)
}
