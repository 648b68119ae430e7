//! Role catalogue and staff assignment ledger.

mod common;

use common::{unique, TestApp, TestStaff};
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_role(app: &TestApp, admin: &TestStaff, permissions: &[&str]) -> Value {
    let code = unique("ROLE");
    let response = app
        .client()
        .post(app.url("/roles"))
        .bearer_auth(&admin.token)
        .json(&json!({
            "role_name": format!("Role {}", code),
            "role_code": code,
            "permissions": permissions,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

async fn assign(app: &TestApp, admin: &TestStaff, staff_id: Uuid, role_id: &str) -> reqwest::Response {
    app.client()
        .post(app.url(&format!("/roles/staff/{}/assign", staff_id)))
        .bearer_auth(&admin.token)
        .json(&json!({ "role_id": role_id }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn duplicate_role_code_is_conflict() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let role = create_role(&app, &admin, &["view_reports"]).await;

    let response = app
        .client()
        .post(app.url("/roles"))
        .bearer_auth(&admin.token)
        .json(&json!({
            "role_name": unique("Other"),
            "role_code": role["role_code"],
            "permissions": [],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn assignment_lifecycle_drives_effective_permissions() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let nurse = app.seed_staff(&[]).await;
    let role = create_role(&app, &admin, &["view_reports", "edit_notes"]).await;
    let role_id = role["role_id"].as_str().unwrap();

    let first = assign(&app, &admin, nurse.staff_id, role_id).await;
    assert_eq!(first.status(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["scope"], "global");
    assert!(first["scope_id"].is_null());
    assert_eq!(first["assigned_by"], json!(admin.staff_id));

    let perms = app.effective_permissions(&admin, nurse.user_id).await;
    assert_eq!(perms, vec!["edit_notes", "view_reports"]);

    let again = assign(&app, &admin, nurse.staff_id, role_id).await;
    assert_eq!(again.status(), 409);

    let removed = app
        .client()
        .delete(app.url(&format!("/roles/staff/{}/roles/{}", nurse.staff_id, role_id)))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(removed.status(), 200);
    assert!(app.effective_permissions(&admin, nurse.user_id).await.is_empty());

    let reassigned: Value = assign(&app, &admin, nurse.staff_id, role_id)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(reassigned["assignment_id"], first["assignment_id"]);
    assert_eq!(reassigned["is_active"], true);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM staff_role_assignments WHERE staff_id = $1",
    )
    .bind(nurse.staff_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn removing_an_unassigned_role_is_not_found() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let nurse = app.seed_staff(&[]).await;
    let role = create_role(&app, &admin, &["view_reports"]).await;

    let response = app
        .client()
        .delete(app.url(&format!(
            "/roles/staff/{}/roles/{}",
            nurse.staff_id,
            role["role_id"].as_str().unwrap()
        )))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn department_scope_requires_scope_id() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let nurse = app.seed_staff(&[]).await;
    let role = create_role(&app, &admin, &["view_reports"]).await;

    let response = app
        .client()
        .post(app.url(&format!("/roles/staff/{}/assign", nurse.staff_id)))
        .bearer_auth(&admin.token)
        .json(&json!({ "role_id": role["role_id"], "scope": "department" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn role_with_active_assignments_cannot_be_deleted() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let nurse = app.seed_staff(&[]).await;
    let role = create_role(&app, &admin, &["view_reports"]).await;
    let role_id = role["role_id"].as_str().unwrap();

    assert_eq!(assign(&app, &admin, nurse.staff_id, role_id).await.status(), 201);

    let blocked = app
        .client()
        .delete(app.url(&format!("/roles/{}", role_id)))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(blocked.status(), 409);

    app.client()
        .delete(app.url(&format!("/roles/staff/{}/roles/{}", nurse.staff_id, role_id)))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();

    let deleted = app
        .client()
        .delete(app.url(&format!("/roles/{}", role_id)))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn managing_roles_requires_manage_roles() {
    let app = TestApp::spawn().await.unwrap();
    let viewer = app.seed_staff(&["view_roles"]).await;

    let listed = app
        .client()
        .get(app.url("/roles"))
        .bearer_auth(&viewer.token)
        .send()
        .await
        .unwrap();
    assert_eq!(listed.status(), 200);

    let created = app
        .client()
        .post(app.url("/roles"))
        .bearer_auth(&viewer.token)
        .json(&json!({ "role_name": unique("Role"), "role_code": unique("R"), "permissions": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 403);
}

async fn patch_role(app: &TestApp, admin: &TestStaff, role_id: &str, body: Value) -> reqwest::Response {
    app.client()
        .patch(app.url(&format!("/roles/{}", role_id)))
        .bearer_auth(&admin.token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn update_checks_uniqueness_against_other_roles_only() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let ward = create_role(&app, &admin, &["view_reports"]).await;
    let theatre = create_role(&app, &admin, &["edit_notes"]).await;
    let ward_id = ward["role_id"].as_str().unwrap();

    let keep_own = patch_role(
        &app,
        &admin,
        ward_id,
        json!({ "role_code": ward["role_code"], "role_name": ward["role_name"], "description": "Ward staff" }),
    )
    .await;
    assert_eq!(keep_own.status(), 200);
    let kept: Value = keep_own.json().await.unwrap();
    assert_eq!(kept["role_code"], ward["role_code"]);
    assert_eq!(kept["description"], "Ward staff");

    let take_code = patch_role(&app, &admin, ward_id, json!({ "role_code": theatre["role_code"] })).await;
    assert_eq!(take_code.status(), 409);

    let take_name = patch_role(&app, &admin, ward_id, json!({ "role_name": theatre["role_name"] })).await;
    assert_eq!(take_name.status(), 409);

    let unchanged: Value = app
        .client()
        .get(app.url(&format!("/roles/{}", ward_id)))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unchanged["role_code"], ward["role_code"]);
    assert_eq!(unchanged["role_name"], ward["role_name"]);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn changing_role_permissions_refreshes_holders() {
    let app = TestApp::spawn().await.unwrap();
    let admin = app.seed_staff(&["admin"]).await;
    let nurse = app.seed_staff(&[]).await;
    let role = create_role(&app, &admin, &["view_reports"]).await;
    let role_id = role["role_id"].as_str().unwrap();

    assert_eq!(assign(&app, &admin, nurse.staff_id, role_id).await.status(), 201);
    assert_eq!(app.cached_permissions(nurse.user_id).await, vec!["view_reports"]);

    let patched = patch_role(&app, &admin, role_id, json!({ "permissions": ["edit_notes"] })).await;
    assert_eq!(patched.status(), 200);
    assert_eq!(app.cached_permissions(nurse.user_id).await, vec!["edit_notes"]);
}
