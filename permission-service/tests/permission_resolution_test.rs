//! Effective permission resolution over the HTTP surface.

mod common;

use common::TestApp;
use serde_json::json;

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn admin_anywhere_collapses_the_effective_set() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin", "view_reports"]).await;

    let body: serde_json::Value = app
        .client()
        .get(app.url("/users/me/permissions"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["permissions"], json!(["admin"]));
    assert_eq!(body["is_admin"], true);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn unknown_user_resolves_to_empty_set() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;

    let perms = app.effective_permissions(&admin, uuid::Uuid::new_v4()).await;
    assert!(perms.is_empty());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn direct_overrides_are_idempotent_and_refresh_the_cache() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let target = app.seed_user(&[]).await;
    let client = app.client();

    for _ in 0..2 {
        let response = client
            .post(app.url(&format!("/users/{}/permissions", target)))
            .bearer_auth(&admin.token)
            .json(&json!({ "permission": "edit_notes" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let direct: Vec<String> =
        sqlx::query_scalar("SELECT direct_permissions FROM users WHERE user_id = $1")
            .bind(target)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(direct, vec!["edit_notes"]);
    assert_eq!(app.cached_permissions(target).await, vec!["edit_notes"]);

    for _ in 0..2 {
        let response = client
            .delete(app.url(&format!("/users/{}/permissions/edit_notes", target)))
            .bearer_auth(&admin.token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
    assert!(app.cached_permissions(target).await.is_empty());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn check_endpoint_supports_any_and_all() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let target = app.seed_user(&["view_reports"]).await;
    let client = app.client();

    let any: serde_json::Value = client
        .get(app.url(&format!(
            "/users/{}/permissions/check?permissions=view_reports,edit_notes&mode=any",
            target
        )))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(any["granted"], true);

    let all: serde_json::Value = client
        .get(app.url(&format!(
            "/users/{}/permissions/check?permissions=view_reports,edit_notes&mode=all",
            target
        )))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["granted"], false);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn reading_other_users_requires_view_user_permissions() {
    let app = TestApp::spawn().await.unwrap();
    let nobody = app.seed_staff(&[]).await;
    let target = app.seed_user(&["view_reports"]).await;

    let response = app
        .client()
        .get(app.url(&format!("/users/{}/permissions", target)))
        .bearer_auth(&nobody.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn refresh_of_missing_user_is_not_found() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;

    let response = app
        .client()
        .post(app.url(&format!("/users/{}/permissions/refresh", uuid::Uuid::new_v4())))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
