use std::time::Duration;

use lib_livedata::access::query::{fetch_page, fetch_page_with_policy, QuerySpec};
use lib_livedata::{ApiClient, ApiError, Credential, Filter, FilterOp, RetryPolicy};
use project_tests::mock_backend::MockBackend;
use serde_json::json;

async fn backend() -> (MockBackend, String) {
    let backend = MockBackend::new();
    backend
        .seed("customers", vec![json!({ "id": "cus_1", "tier": "gold" })])
        .await;
    let addr = backend.serve().await.expect("mock backend should bind");
    (backend, format!("http://{}/", addr))
}

#[tokio::test]
async fn missing_credential_is_unauthenticated() {
    let (_backend, base_url) = backend().await;
    let anonymous = ApiClient::new(&base_url, Credential::new("acme", None)).unwrap();

    let result = fetch_page(&anonymous, &QuerySpec::new("customers", 5)).await;
    assert!(matches!(result, Err(ApiError::Unauthenticated)));
}

#[tokio::test]
async fn protected_collection_is_forbidden() {
    let (_backend, base_url) = backend().await;
    let client = ApiClient::new(&base_url, Credential::new("acme", Some("tok".to_string()))).unwrap();

    let result = fetch_page(&client, &QuerySpec::new("restricted", 5)).await;
    assert!(matches!(result, Err(ApiError::Forbidden(_))));
}

#[tokio::test]
async fn unknown_filter_field_fails_validation_with_field_messages() {
    let (_backend, base_url) = backend().await;
    let client = ApiClient::new(&base_url, Credential::new("acme", Some("tok".to_string()))).unwrap();

    let spec = QuerySpec::new("customers", 5)
        .filter(Filter::new("no_such_field", FilterOp::Eq, json!("x")));
    match fetch_page(&client, &spec).await {
        Err(ApiError::ValidationFailed { fields, .. }) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "no_such_field");
        }
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn persistent_outage_surfaces_as_unavailable() {
    let (backend, base_url) = backend().await;
    let policy = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    };
    let client =
        ApiClient::with_policy(&base_url, Credential::new("acme", Some("tok".to_string())), &policy)
            .unwrap();

    // More injected failures than the client has attempts.
    backend.fail_with(503, 20).await;
    let result = fetch_page_with_policy(&client, &QuerySpec::new("customers", 5), &policy).await;
    assert!(matches!(result, Err(ApiError::Unavailable(_))));
}

#[tokio::test]
async fn short_outage_is_absorbed_by_retries() {
    let (backend, base_url) = backend().await;
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    };
    let client =
        ApiClient::with_policy(&base_url, Credential::new("acme", Some("tok".to_string())), &policy)
            .unwrap();

    backend.fail_with(503, 1).await;
    let page = fetch_page_with_policy(&client, &QuerySpec::new("customers", 5), &policy)
        .await
        .expect("one 503 should be retried away");
    assert_eq!(page.edges.len(), 1);
}
