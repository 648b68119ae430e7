//! Health, metrics and authentication surface tests.

mod common;

use common::TestApp;

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn health_check_returns_200() {
    let app = TestApp::spawn().await.expect("Failed to spawn test app");

    let response = app
        .client()
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "permission-service-test");
    assert_eq!(body["checks"]["postgres"], "up");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn metrics_endpoint_exposes_prometheus_text() {
    let app = TestApp::spawn().await.expect("Failed to spawn test app");

    app.client().get(app.url("/health")).send().await.unwrap();
    let body = app
        .client()
        .get(app.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("http_requests_total"));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn protected_routes_reject_missing_and_forged_tokens() {
    let app = TestApp::spawn().await.expect("Failed to spawn test app");

    let missing = app
        .client()
        .get(app.url("/users/me/permissions"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let forged = app
        .client()
        .get(app.url("/users/me/permissions"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status(), 401);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn openapi_document_is_served() {
    let app = TestApp::spawn().await.expect("Failed to spawn test app");

    let response = app
        .client()
        .get(app.url("/.well-known/openapi.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let doc: serde_json::Value = response.json().await.unwrap();
    assert!(doc["paths"]["/temporary-permissions/{id}/extend"].is_object());
}
