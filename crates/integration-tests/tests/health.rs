//! Health endpoint tests for both servers.

use kedai_integration_tests::{admin_url, storefront_url};
use reqwest::StatusCode;

async fn assert_healthy(base: &str) {
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/health"))
        .send()
        .await
        .expect("Failed to call /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base}/health/ready"))
        .send()
        .await
        .expect("Failed to call /health/ready");
    assert_eq!(resp.status(), StatusCode::OK, "database should be reachable");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_storefront_health() {
    assert_healthy(&storefront_url()).await;
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_admin_health() {
    assert_healthy(&admin_url()).await;
}
