//! Scenario: Discord REST adapter
//!
//! Drives `DiscordPlatform` against a local httpmock server standing in for
//! the Discord API.
//!
//! # Invariants under test
//!
//! 1. Every call carries the bot token in the `Authorization` header.
//! 2. `role_exists` reads the guild role list.
//! 3. `fetch_member` maps 404 to `None` and parses roles and join time.
//! 4. Role add/remove use PUT/DELETE on the per-member role endpoint; a
//!    refusal surfaces as `Rejected` with the HTTP status.
//! 5. A malformed member id is rejected before any request is sent, so it can
//!    never retarget a call at another endpoint or role.

use httpmock::prelude::*;
use serde_json::json;
use vip_daemon::{config::DiscordConfig, discord::DiscordPlatform};
use vip_reconcile::{MemberPlatform, PortError};

fn platform(server: &MockServer) -> DiscordPlatform {
    DiscordPlatform::new(DiscordConfig {
        token: "tok".to_string(),
        api_base: server.base_url(),
        guild_id: "g1".to_string(),
    })
    .expect("client builds")
}

#[tokio::test]
async fn role_exists_reads_guild_roles() {
    let server = MockServer::start_async().await;
    let roles = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/guilds/g1/roles")
                .header("Authorization", "Bot tok");
            then.status(200)
                .json_body(json!([{ "id": "r1", "name": "VIP" }, { "id": "r2" }]));
        })
        .await;

    let p = platform(&server);
    assert!(p.role_exists("r1").await.unwrap());
    assert!(!p.role_exists("r9").await.unwrap());
    roles.assert_hits_async(2).await;
}

#[tokio::test]
async fn fetch_member_parses_roles_and_join_time() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/guilds/g1/members/42");
            then.status(200).json_body(json!({
                "user": { "id": "42" },
                "roles": ["r1"],
                "joined_at": "2024-01-01T00:00:00+00:00"
            }));
        })
        .await;

    let m = platform(&server)
        .fetch_member("42")
        .await
        .unwrap()
        .expect("member present");
    assert_eq!(m.member_id, "42");
    assert_eq!(m.joined_at_ms, Some(1_704_067_200_000));
    assert!(m.has_role("r1"));
}

#[tokio::test]
async fn fetch_member_not_found_is_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/guilds/g1/members/404");
            then.status(404)
                .json_body(json!({ "message": "Unknown Member", "code": 10007 }));
        })
        .await;

    assert_eq!(platform(&server).fetch_member("404").await.unwrap(), None);
}

#[tokio::test]
async fn fetch_member_server_error_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/guilds/g1/members/5");
            then.status(502).body("bad gateway");
        })
        .await;

    let err = platform(&server).fetch_member("5").await.unwrap_err();
    assert_eq!(
        err,
        PortError::Rejected {
            status: Some(502),
            message: "bad gateway".to_string(),
        }
    );
}

#[tokio::test]
async fn role_mutations_use_put_and_delete() {
    let server = MockServer::start_async().await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/guilds/g1/members/42/roles/r1")
                .header("Authorization", "Bot tok")
                .header_exists("X-Audit-Log-Reason");
            then.status(204);
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/guilds/g1/members/42/roles/r1");
            then.status(204);
        })
        .await;

    let p = platform(&server);
    p.add_role("42", "r1").await.unwrap();
    p.remove_role("42", "r1").await.unwrap();
    put.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn refused_role_mutation_carries_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/guilds/g1/members/42/roles/r1");
            then.status(403)
                .json_body(json!({ "message": "Missing Permissions", "code": 50013 }));
        })
        .await;

    match platform(&server).add_role("42", "r1").await {
        Err(PortError::Rejected { status, message }) => {
            assert_eq!(status, Some(403));
            assert!(message.contains("Missing Permissions"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_member_id_never_reaches_the_api() {
    let server = MockServer::start_async().await;
    let admin_put = server
        .mock_async(|when, then| {
            when.method(PUT).path("/guilds/g1/members/42/roles/ADMIN");
            then.status(204);
        })
        .await;
    let any_put = server
        .mock_async(|when, then| {
            when.method(PUT);
            then.status(204);
        })
        .await;
    let any_get = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({ "roles": [] }));
        })
        .await;

    let p = platform(&server);
    for bad in ["42/roles/ADMIN?", "42/roles/ADMIN#", "../roles", "42 ", ""] {
        match p.add_role(bad, "vip-role").await {
            Err(PortError::Rejected { status: None, .. }) => {}
            other => panic!("expected local rejection for {bad:?}, got {other:?}"),
        }
        assert!(p.fetch_member(bad).await.is_err());
    }

    assert_eq!(admin_put.hits_async().await, 0);
    assert_eq!(any_put.hits_async().await, 0);
    assert_eq!(any_get.hits_async().await, 0);
}
