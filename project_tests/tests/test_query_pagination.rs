use std::collections::HashSet;

use lib_livedata::access::query::{fetch_all, fetch_page, Pager, QuerySpec};
use lib_livedata::{ApiClient, Credential, Direction, Filter, FilterOp, PageRequest, Sort};
use project_tests::mock_backend::MockBackend;
use serde_json::json;

/// Twelve work orders: wo_01..wo_12, even ones "open", odd "scheduled",
/// priority equal to their number.
async fn backend_with_work_orders() -> (MockBackend, ApiClient) {
    let backend = MockBackend::new();
    backend
        .seed(
            "work_orders",
            (1..=12)
                .map(|n| {
                    json!({
                        "id": format!("wo_{:02}", n),
                        "status": if n % 2 == 0 { "open" } else { "scheduled" },
                        "priority": n,
                    })
                })
                .collect(),
        )
        .await;
    let addr = backend.serve().await.expect("mock backend should bind");
    let client = ApiClient::new(
        &format!("http://{}/", addr),
        Credential::new("acme", Some("test-token".to_string())),
    )
    .expect("client should build");
    (backend, client)
}

#[tokio::test]
async fn first_page_has_five_edges_and_more_to_come() {
    let (_backend, client) = backend_with_work_orders().await;
    let page = fetch_page(&client, &QuerySpec::new("work_orders", 5))
        .await
        .expect("query should succeed");

    assert_eq!(page.edges.len(), 5);
    assert!(page.page_info.has_next_page);
    assert!(!page.page_info.has_previous_page);
    assert_eq!(page.total_count, Some(12));
}

#[tokio::test]
async fn load_more_observes_all_twelve_ids_exactly_once() {
    let (_backend, client) = backend_with_work_orders().await;
    let mut pager = Pager::new(QuerySpec::new("work_orders", 5));

    let mut seen = HashSet::new();
    let mut pages = 0;
    while let Some(page) = pager.load_more(&client).await.expect("page should load") {
        pages += 1;
        for record in page.records() {
            assert!(seen.insert(record.id.clone()), "duplicate id {}", record.id);
        }
    }

    assert_eq!(pages, 3, "5 + 5 + 2 records over three pages");
    assert_eq!(seen.len(), 12);
    assert!(pager.exhausted());
    assert!(pager.load_more(&client).await.unwrap().is_none());
}

#[tokio::test]
async fn full_traversal_yields_no_gaps_or_duplicates() {
    let (_backend, client) = backend_with_work_orders().await;
    let records = fetch_all(&client, &QuerySpec::new("work_orders", 4))
        .await
        .expect("traversal should succeed");

    let ids: HashSet<_> = records.iter().map(|r| r.id.clone()).collect();
    assert_eq!(records.len(), 12);
    assert_eq!(ids.len(), 12);
    for n in 1..=12 {
        assert!(ids.contains(&format!("wo_{:02}", n)));
    }
}

#[tokio::test]
async fn filters_narrow_the_result_set() {
    let (_backend, client) = backend_with_work_orders().await;

    let open = fetch_all(
        &client,
        &QuerySpec::new("work_orders", 10).filter(Filter::new("status", FilterOp::Eq, json!("open"))),
    )
    .await
    .unwrap();
    assert_eq!(open.len(), 6);

    let urgent = fetch_all(
        &client,
        &QuerySpec::new("work_orders", 10).filter(Filter::new("priority", FilterOp::Gte, json!(7))),
    )
    .await
    .unwrap();
    assert_eq!(urgent.len(), 6);

    let combined = fetch_all(
        &client,
        &QuerySpec::new("work_orders", 10)
            .filter(Filter::new("status", FilterOp::In, json!(["open"])))
            .filter(Filter::new("priority", FilterOp::Lt, json!(5))),
    )
    .await
    .unwrap();
    assert_eq!(combined.len(), 2, "wo_02 and wo_04");
}

#[tokio::test]
async fn sorting_controls_cursor_order() {
    let (_backend, client) = backend_with_work_orders().await;
    let page = fetch_page(
        &client,
        &QuerySpec::new("work_orders", 3).sort(Sort {
            field: "priority".to_string(),
            direction: Direction::Desc,
        }),
    )
    .await
    .unwrap();

    let ids: Vec<_> = page.records().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["wo_12", "wo_11", "wo_10"]);
}

#[tokio::test]
async fn backward_pagination_returns_the_tail() {
    let (_backend, client) = backend_with_work_orders().await;
    let page = fetch_page(
        &client,
        &QuerySpec::new("work_orders", 5).page(PageRequest::Backward {
            last: 5,
            before: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(page.edges.len(), 5);
    assert!(page.page_info.has_previous_page);
    assert!(!page.page_info.has_next_page);
    let ids: Vec<_> = page.records().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["wo_08", "wo_09", "wo_10", "wo_11", "wo_12"]);
}

#[tokio::test]
async fn total_count_is_advisory_per_filter() {
    let (_backend, client) = backend_with_work_orders().await;
    let page = fetch_page(
        &client,
        &QuerySpec::new("work_orders", 2).filter(Filter::new("status", FilterOp::Eq, json!("open"))),
    )
    .await
    .unwrap();
    assert_eq!(page.total_count, Some(6));
}
