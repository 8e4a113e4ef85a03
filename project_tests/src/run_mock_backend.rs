use project_tests::mock_backend::MockBackend;
use serde_json::json;

/// Standalone mock backend for manual runs: seeds a few demo collections
/// and serves until interrupted. Point the CLI tools at the printed URL.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let backend = MockBackend::new();
    backend
        .seed(
            "customers",
            vec![
                json!({ "id": "cus_1", "name": "Acme Plumbing", "tier": "gold" }),
                json!({ "id": "cus_2", "name": "Borealis HVAC", "tier": "silver" }),
            ],
        )
        .await;
    backend
        .seed(
            "work_orders",
            (1..=12)
                .map(|n| json!({ "id": format!("wo_{:02}", n), "status": if n % 2 == 0 { "open" } else { "scheduled" } }))
                .collect(),
        )
        .await;

    let addr = backend.serve().await?;
    println!("mock backend ready:");
    println!("  base URL: http://{}/", addr);
    println!("  socket:   ws://{}/subscriptions", addr);

    tokio::signal::ctrl_c().await?;
    Ok(())
}
