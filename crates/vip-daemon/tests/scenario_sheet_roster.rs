//! Scenario: Spreadsheet roster reader
//!
//! # Invariants under test
//!
//! 1. A published CSV is fetched and split into raw rows, header included.
//! 2. A non-success response is a transport failure, never an empty roster.
//! 3. Rows fetched over HTTP feed `parse_roster` unchanged.

use httpmock::prelude::*;
use vip_daemon::sheet::SheetRoster;
use vip_reconcile::{parse_roster, PortError, RosterColumns, RosterSource};

const CSV: &str = "timestamp,discord_id,lifetime_vip\n\
                   2024-01-01,123,YES\n\
                   2024-01-02,456,no\n\
                   \n\
                   2024-01-03,789, yes \n";

#[tokio::test]
async fn csv_export_is_fetched_as_rows() {
    let server = MockServer::start_async().await;
    let export = server
        .mock_async(|when, then| {
            when.method(GET).path("/export").query_param("format", "csv");
            then.status(200)
                .header("content-type", "text/csv")
                .body(CSV);
        })
        .await;

    let roster = SheetRoster::new(server.url("/export?format=csv")).unwrap();
    let rows = roster.fetch_rows().await.unwrap();
    export.assert_async().await;

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], vec!["timestamp", "discord_id", "lifetime_vip"]);

    let map = parse_roster(&rows, &RosterColumns::default()).unwrap();
    let approved: Vec<&str> = map.approved_ids().collect();
    assert_eq!(approved, vec!["123", "789"]);
    assert!(!map.is_approved("456"));
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/export");
            then.status(500).body("oops");
        })
        .await;

    let roster = SheetRoster::new(server.url("/export")).unwrap();
    match roster.fetch_rows().await {
        Err(PortError::Transport(msg)) => assert!(msg.contains("500")),
        other => panic!("expected Transport error, got {other:?}"),
    }
}
