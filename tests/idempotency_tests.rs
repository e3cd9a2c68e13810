mod common;

use axum::http::StatusCode;
use common::{post_json, send, spawn_app, spawn_app_with_store, FailingStore, ReadOnlyStore};
use inventory_api::idempotency::{IdempotencyConfig, MemoryIdempotencyStore, CONFLICT_MESSAGE};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const PRODUCTS: &str = "/api/v1/products";

#[tokio::test]
async fn test_replay_and_conflict_end_to_end() {
    let app = spawn_app();

    let first = app
        .post(PRODUCTS, Some("abc123"), r#"{"productName":"TestProd"}"#)
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body, json!({ "id": 1 }));
    assert_eq!(first.location(), Some("/api/v1/products/1"));

    let replay = app
        .post(PRODUCTS, Some("abc123"), r#"{"productName":"TestProd"}"#)
        .await;
    assert_eq!(replay.status, StatusCode::CREATED);
    assert_eq!(replay.body, json!({ "id": 1 }));
    assert_eq!(replay.location(), Some("/api/v1/products/1"));

    let conflict = app
        .post(PRODUCTS, Some("abc123"), r#"{"productName":"Other"}"#)
        .await;
    assert_eq!(conflict.status, StatusCode::CONFLICT);
    assert_eq!(
        conflict.body,
        json!({
            "error": CONFLICT_MESSAGE,
            "key": "abc123",
            "existingResourceId": 1
        })
    );

    assert_eq!(app.inventory.product_count().await, 1);

    let snapshot = app.gate.metrics().snapshot();
    assert_eq!(snapshot.replayed_requests, 1);
    assert_eq!(snapshot.conflicting_requests, 1);
    assert_eq!(snapshot.stored_records, 1);
}

#[tokio::test]
async fn test_replay_ignores_key_order_and_whitespace() {
    let app = spawn_app();

    let first = app
        .post(PRODUCTS, Some("order"), r#"{"productName":"Widget","extra":{"b":1,"a":2}}"#)
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let reordered = app
        .post(
            PRODUCTS,
            Some("order"),
            "{ \"extra\" : { \"a\" : 2, \"b\" : 1 },\n  \"productName\" : \"Widget\" }",
        )
        .await;
    assert_eq!(reordered.status, StatusCode::CREATED);
    assert_eq!(reordered.body, first.body);
    assert_eq!(app.inventory.product_count().await, 1);
}

#[tokio::test]
async fn test_requests_without_key_are_not_deduplicated() {
    let app = spawn_app();

    for expected_id in 1..=3 {
        let response = app.post(PRODUCTS, None, r#"{"productName":"Same"}"#).await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body, json!({ "id": expected_id }));
    }

    let blank = app.post(PRODUCTS, Some("   "), r#"{"productName":"Same"}"#).await;
    assert_eq!(blank.body, json!({ "id": 4 }));

    assert_eq!(app.inventory.product_count().await, 4);
    assert_eq!(app.gate.metrics().snapshot().passthrough_requests, 4);
}

#[tokio::test(start_paused = true)]
async fn test_key_is_reusable_after_ttl() {
    let config = IdempotencyConfig {
        ttl: Duration::from_secs(60),
        ..IdempotencyConfig::default()
    };
    let app = spawn_app_with_store(Arc::new(MemoryIdempotencyStore::new()), config);

    let first = app.post(PRODUCTS, Some("ttl-key"), r#"{"productName":"A"}"#).await;
    assert_eq!(first.body, json!({ "id": 1 }));

    tokio::time::advance(Duration::from_secs(59)).await;
    let replay = app.post(PRODUCTS, Some("ttl-key"), r#"{"productName":"A"}"#).await;
    assert_eq!(replay.body, json!({ "id": 1 }));

    tokio::time::advance(Duration::from_secs(2)).await;
    let fresh = app.post(PRODUCTS, Some("ttl-key"), r#"{"productName":"A"}"#).await;
    assert_eq!(fresh.status, StatusCode::CREATED);
    assert_eq!(fresh.body, json!({ "id": 2 }));
    assert_eq!(app.inventory.product_count().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retries_create_one_resource() {
    let app = spawn_app();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            send(router, post_json(PRODUCTS, Some("race"), r#"{"productName":"Racer"}"#)).await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body, json!({ "id": 1 }));
    }

    assert_eq!(app.inventory.product_count().await, 1);
}

#[tokio::test]
async fn test_store_outage_returns_503_without_creating() {
    let app = spawn_app_with_store(Arc::new(FailingStore), IdempotencyConfig::default());

    let response = app.post(PRODUCTS, Some("down"), r#"{"productName":"A"}"#).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["error"]["code"], "IDEMPOTENCY_STORE_UNAVAILABLE");
    assert_eq!(app.inventory.product_count().await, 0);

    // Unkeyed requests never touch the store.
    let unkeyed = app.post(PRODUCTS, None, r#"{"productName":"A"}"#).await;
    assert_eq!(unkeyed.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_store_write_failure_surfaces() {
    let app = spawn_app_with_store(Arc::new(ReadOnlyStore::default()), IdempotencyConfig::default());

    let response = app.post(PRODUCTS, Some("ro"), r#"{"productName":"A"}"#).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_failed_create_leaves_key_reusable() {
    let app = spawn_app();

    let invalid = app.post(PRODUCTS, Some("retry-me"), r#"{"productName":""}"#).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert!(invalid.body.to_string().contains("must not be empty"));

    let fixed = app.post(PRODUCTS, Some("retry-me"), r#"{"productName":"Fixed"}"#).await;
    assert_eq!(fixed.status, StatusCode::CREATED);
    assert_eq!(fixed.body, json!({ "id": 1 }));
}

#[tokio::test]
async fn test_malformed_body_is_hashed_not_rejected_by_gate() {
    let app = spawn_app();

    let first = app.post(PRODUCTS, Some("junk"), "not json").await;
    assert_eq!(first.status, StatusCode::BAD_REQUEST);

    // Nothing was stored, so a valid body under the same key goes through.
    let valid = app.post(PRODUCTS, Some("junk"), r#"{"productName":"A"}"#).await;
    assert_eq!(valid.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_same_key_on_different_paths_is_independent() {
    let app = spawn_app();

    let product = app.post(PRODUCTS, Some("shared"), r#"{"productName":"A"}"#).await;
    assert_eq!(product.body, json!({ "id": 1 }));

    let item = app
        .post("/api/v1/products/1/items", Some("shared"), r#"{"quantity":5}"#)
        .await;
    assert_eq!(item.status, StatusCode::CREATED);
    assert_eq!(item.body, json!({ "id": 1 }));
    assert_eq!(item.location(), Some("/api/v1/products/1/items/1"));

    let item_replay = app
        .post("/api/v1/products/1/items", Some("shared"), r#"{"quantity":5}"#)
        .await;
    assert_eq!(item_replay.body, json!({ "id": 1 }));

    let item_conflict = app
        .post("/api/v1/products/1/items", Some("shared"), r#"{"quantity":6}"#)
        .await;
    assert_eq!(item_conflict.status, StatusCode::CONFLICT);
    assert_eq!(item_conflict.body["existingResourceId"], 1);

    assert_eq!(app.inventory.item_count().await, 1);
}

#[tokio::test]
async fn test_item_create_for_missing_product_is_not_stored() {
    let app = spawn_app();

    let missing = app
        .post("/api/v1/products/42/items", Some("k"), r#"{"quantity":1}"#)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    app.post(PRODUCTS, None, r#"{"productName":"A"}"#).await;
    let created = app
        .post("/api/v1/products/1/items", Some("k"), r#"{"quantity":1}"#)
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_non_post_requests_are_untouched() {
    let app = spawn_app();
    app.post(PRODUCTS, Some("k"), r#"{"productName":"A"}"#).await;
    let before = app.gate.metrics().snapshot().total_requests;

    let response = app.get(PRODUCTS).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.gate.metrics().snapshot().total_requests, before);
}
