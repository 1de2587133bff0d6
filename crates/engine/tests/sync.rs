mod common;

use std::time::Duration;

use common::{Reply, activated};
use serde_json::json;
use tsync_client::{Credentials, Request, Response};

async fn queue(h: &common::Harness, payloads: &[serde_json::Value]) -> Vec<i64> {
    h.go_offline();
    let mut ids = Vec::new();
    for payload in payloads {
        let request = Request::post_json(h.engine.url("/api/test_result/").unwrap(), payload);
        let response = h.engine.handle(request).await;
        assert_eq!(response.status, 202);
        ids.push(response.body_json().unwrap()["pending_id"].as_i64().unwrap());
    }
    h.go_online();
    ids
}

#[tokio::test]
async fn test_sync_empty_queue() {
    let h = activated().await;

    let report = h.engine.sync("sync-pending-results").await.unwrap();

    assert!(report.replayed.is_empty());
    assert!(report.failed.is_empty());
    assert!(h.transport.calls_to("POST", "/api/test_result/").is_empty());
}

#[tokio::test]
async fn test_sync_replays_all_once_in_order() {
    let h = activated().await;
    let payloads = vec![json!({ "score": 1 }), json!({ "score": 2 }), json!({ "score": 3 })];
    let ids = queue(&h, &payloads).await;
    h.transport.respond("POST", "/api/test_result/", Response::new(201, "{}"));

    let report = h.engine.sync("sync-pending-results").await.unwrap();

    assert_eq!(report.replayed, ids);
    assert!(h.engine.list_pending().await.unwrap().is_empty());

    let posted: Vec<serde_json::Value> = h
        .transport
        .calls_to("POST", "/api/test_result/")
        .iter()
        .map(|r| r.body_json().unwrap())
        .collect();
    assert_eq!(posted, payloads);
    assert!(
        h.transport
            .calls_to("POST", "/api/test_result/")
            .iter()
            .all(|r| r.credentials == Credentials::Include)
    );
}

#[tokio::test]
async fn test_sync_failure_keeps_record() {
    let h = activated().await;
    let ids = queue(&h, &[json!({ "score": 1 }), json!({ "score": 2 })]).await;
    h.transport.reply("POST", "/api/test_result/", Reply::Throw("connection reset".into()));
    h.transport.respond("POST", "/api/test_result/", Response::new(201, "{}"));

    let report = h.engine.sync("sync-pending-results").await.unwrap();

    assert_eq!(report.replayed, vec![ids[1]]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, ids[0]);

    let pending = h.engine.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, ids[0]);
    assert_eq!(pending[0].attempts, 1);
    assert!(pending[0].last_error.as_deref().unwrap().contains("REPLAY_FAILED"));
}

#[tokio::test]
async fn test_sync_non_ok_counts_as_failure() {
    let h = activated().await;
    let ids = queue(&h, &[json!({ "score": 4 })]).await;
    h.transport.respond("POST", "/api/test_result/", Response::new(500, ""));

    let report = h.engine.sync("sync-pending-results").await.unwrap();

    assert!(report.replayed.is_empty());
    assert_eq!(report.failed[0].0, ids[0]);
    assert!(report.failed[0].1.contains("status 500"));
    assert_eq!(h.engine.list_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sync_ignores_unregistered_tag() {
    let h = activated().await;
    queue(&h, &[json!({ "score": 1 })]).await;
    h.transport.respond("POST", "/api/test_result/", Response::new(200, "{}"));

    let report = h.engine.sync("some-other-tag").await.unwrap();

    assert!(report.skipped);
    assert_eq!(h.engine.list_pending().await.unwrap().len(), 1);
    assert!(h.transport.calls_to("POST", "/api/test_result/").is_empty());
}

#[tokio::test]
async fn test_scheduler_fires_registered_tag() {
    let h = activated().await;
    queue(&h, &[json!({ "score": 1 })]).await;
    h.transport.respond("POST", "/api/test_result/", Response::new(200, "{}"));

    assert_eq!(h.engine.scheduler().registered().await, vec!["sync-pending-results".to_string()]);
    let report = h.engine.scheduler().fire("sync-pending-results").await.unwrap();

    assert_eq!(report.replayed.len(), 1);
    assert!(h.engine.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconnect_drains_queue() {
    let h = activated().await;
    h.transport.respond("POST", "/api/test_result/", Response::new(200, "{}"));
    h.go_offline();
    let task = h.engine.watch_connectivity(h.connectivity.subscribe());

    let request = Request::post_json(h.engine.url("/api/test_result/").unwrap(), &json!({ "score": 5 }));
    assert_eq!(h.engine.handle(request).await.status, 202);

    h.go_online();
    for _ in 0..50 {
        if h.engine.list_pending().await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(h.engine.list_pending().await.unwrap().is_empty());
    assert_eq!(h.transport.calls_to("POST", "/api/test_result/").len(), 1);
    task.abort();
}

#[tokio::test]
async fn test_scheduler_registered_tag_reaches_coordinator() {
    let h = activated().await;
    let ids = queue(&h, &[json!({ "score": 1 })]).await;
    h.transport.respond("POST", "/api/test_result/", Response::new(200, "{}"));

    assert!(h.engine.scheduler().register("results-retry").await);
    let report = h.engine.scheduler().fire("results-retry").await.unwrap();

    assert!(!report.skipped);
    assert_eq!(report.replayed, ids);
    assert!(h.engine.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unregistered_default_tag_stops_direct_sync() {
    let h = activated().await;
    queue(&h, &[json!({ "score": 1 })]).await;
    h.transport.respond("POST", "/api/test_result/", Response::new(200, "{}"));

    assert!(h.engine.scheduler().unregister("sync-pending-results").await);
    let report = h.engine.sync("sync-pending-results").await.unwrap();

    assert!(report.skipped);
    assert_eq!(h.engine.list_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_syncs_post_each_record_once() {
    let h = activated().await;
    let ids = queue(&h, &[json!({ "score": 1 })]).await;
    h.transport.respond("POST", "/api/test_result/", Response::new(200, "{}"));

    let (first, second) =
        tokio::join!(h.engine.sync("sync-pending-results"), h.engine.sync("sync-pending-results"));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(h.transport.calls_to("POST", "/api/test_result/").len(), 1);
    let replayed: Vec<i64> = first.replayed.into_iter().chain(second.replayed).collect();
    assert_eq!(replayed, ids);
    assert!(first.already_handled.is_empty() && second.already_handled.is_empty());
    assert!(h.engine.list_pending().await.unwrap().is_empty());
}
