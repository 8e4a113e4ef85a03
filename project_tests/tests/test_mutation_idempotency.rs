use lib_livedata::access::mutate::{submit, submit_optimistic, MutationSpec};
use lib_livedata::{ApiClient, CacheState, Credential, Record, RecordCache, RetryPolicy};
use project_tests::mock_backend::MockBackend;
use serde_json::json;
use std::time::Duration;

async fn backend_and_client() -> (MockBackend, ApiClient) {
    let backend = MockBackend::new();
    let addr = backend.serve().await.expect("mock backend should bind");
    let client = ApiClient::new(
        &format!("http://{}/", addr),
        Credential::new("acme", Some("test-token".to_string())),
    )
    .expect("client should build");
    (backend, client)
}

fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn same_token_twice_applies_exactly_one_write() {
    let (backend, client) = backend_and_client().await;
    let spec = MutationSpec::create("customers", json!({ "name": "Acme Plumbing" }));

    let first = submit(&client, &quick_policy(), &spec).await.unwrap();
    // Deliberate client-side replay of the same intent.
    let second = submit(&client, &quick_policy(), &spec).await.unwrap();

    assert_eq!(first, second, "replay must return the original result");
    assert_eq!(backend.record_count("customers").await, 1);
}

#[tokio::test]
async fn transient_failure_is_retried_with_the_same_token() {
    let (backend, client) = backend_and_client().await;
    backend.fail_with(503, 1).await;

    let spec = MutationSpec::create("customers", json!({ "name": "Borealis HVAC" }));
    let record = submit(&client, &quick_policy(), &spec).await.unwrap();

    assert_eq!(record.revision, 1);
    assert_eq!(backend.record_count("customers").await, 1, "retry must not duplicate");
}

#[tokio::test]
async fn distinct_tokens_are_distinct_intents() {
    let (backend, client) = backend_and_client().await;
    let payload = json!({ "name": "Cascade Electric" });

    submit(&client, &quick_policy(), &MutationSpec::create("customers", payload.clone()))
        .await
        .unwrap();
    submit(&client, &quick_policy(), &MutationSpec::create("customers", payload))
        .await
        .unwrap();

    assert_eq!(backend.record_count("customers").await, 2);
}

#[tokio::test]
async fn revision_mismatch_maps_to_conflict() {
    let (backend, client) = backend_and_client().await;
    backend
        .seed("customers", vec![json!({ "id": "cus_1", "tier": "gold" })])
        .await;

    let spec = MutationSpec::update("customers", "cus_1", json!({ "tier": "platinum" }))
        .expect_revision(99);
    let result = submit(&client, &quick_policy(), &spec).await;

    assert!(matches!(result, Err(lib_livedata::ApiError::Conflict(_))));
}

#[tokio::test]
async fn update_bumps_the_revision() {
    let (backend, client) = backend_and_client().await;
    backend
        .seed("customers", vec![json!({ "id": "cus_2", "tier": "silver" })])
        .await;

    let spec = MutationSpec::update("customers", "cus_2", json!({ "tier": "gold" }))
        .expect_revision(1);
    let record = submit(&client, &quick_policy(), &spec).await.unwrap();

    assert_eq!(record.revision, 2);
    assert_eq!(record.field("tier"), Some(&json!("gold")));
}

#[tokio::test]
async fn failed_optimistic_write_rolls_the_cache_back() {
    let (backend, client) = backend_and_client().await;
    backend
        .seed("customers", vec![json!({ "id": "cus_3", "tier": "gold" })])
        .await;

    let cache = RecordCache::new();
    let confirmed: Record =
        serde_json::from_value(json!({ "id": "cus_3", "revision": 1, "tier": "gold" })).unwrap();
    cache.apply_confirmed(&confirmed).await;

    let spec = MutationSpec::update("customers", "cus_3", json!({ "tier": "downgraded" }))
        .expect_revision(42);
    let result = submit_optimistic(&client, &quick_policy(), &cache, &spec).await;
    assert!(result.is_err());

    let view = cache.get("cus_3").await.expect("record should remain cached");
    assert_eq!(view.state, CacheState::Confirmed { revision: 1 });
    assert_eq!(view.value["tier"], json!("gold"));
}

#[tokio::test]
async fn successful_optimistic_write_confirms_in_the_cache() {
    let (backend, client) = backend_and_client().await;
    backend
        .seed("customers", vec![json!({ "id": "cus_4", "tier": "silver" })])
        .await;

    let cache = RecordCache::new();
    let spec = MutationSpec::update("customers", "cus_4", json!({ "tier": "gold" }));
    let record = submit_optimistic(&client, &quick_policy(), &cache, &spec)
        .await
        .unwrap();

    assert_eq!(record.revision, 2);
    let view = cache.get("cus_4").await.unwrap();
    assert_eq!(view.state, CacheState::Confirmed { revision: 2 });
    assert_eq!(view.value["tier"], json!("gold"));
}
