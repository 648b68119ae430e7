//! Permission request workflow: multi-approver voting, rejection, cancellation and expiry.

mod common;

use common::{TestApp, TestStaff};
use serde_json::{json, Value};

const APPROVER: &str = "approve_permission_requests";

async fn file_request(app: &TestApp, requester: &TestStaff, approvers: &[&TestStaff]) -> reqwest::Response {
    let approver_ids: Vec<_> = approvers.iter().map(|a| a.user_id).collect();
    app.client()
        .post(app.url("/permission-requests"))
        .bearer_auth(&requester.token)
        .json(&json!({
            "permission": "view_lab_results",
            "reason": "Reviewing results for an incoming transfer",
            "urgency": "HIGH",
            "approver_ids": approver_ids,
        }))
        .send()
        .await
        .unwrap()
}

async fn vote(app: &TestApp, approver: &TestStaff, request_id: &str, verb: &str) -> reqwest::Response {
    app.client()
        .post(app.url(&format!("/permission-requests/{}/{}", request_id, verb)))
        .bearer_auth(&approver.token)
        .json(&json!({ "comments": "Reviewed" }))
        .send()
        .await
        .unwrap()
}

struct Fixture {
    app: TestApp,
    requester: TestStaff,
    first: TestStaff,
    second: TestStaff,
    request_id: String,
}

async fn pending_request() -> Fixture {
    let app = TestApp::spawn().await.unwrap();
    let requester = app.seed_staff(&[]).await;
    let first = app.seed_staff(&[APPROVER]).await;
    let second = app.seed_staff(&[APPROVER]).await;

    let response = file_request(&app, &requester, &[&first, &second]).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["approvers"].as_array().unwrap().len(), 2);

    Fixture {
        request_id: body["request_id"].as_str().unwrap().to_string(),
        app,
        requester,
        first,
        second,
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn request_is_approved_only_after_every_approver_votes() {
    let f = pending_request().await;

    let after_first: Value = vote(&f.app, &f.first, &f.request_id, "approve")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(after_first["status"], "PENDING");
    assert_eq!(f.app.count_grants(f.requester.user_id, "view_lab_results").await, 0);

    let after_second = vote(&f.app, &f.second, &f.request_id, "approve").await;
    assert_eq!(after_second.status(), 200);
    let after_second: Value = after_second.json().await.unwrap();
    assert_eq!(after_second["status"], "APPROVED");
    assert!(after_second["granted_temp_permission_id"].is_string());

    assert_eq!(f.app.count_grants(f.requester.user_id, "view_lab_results").await, 1);
    assert_eq!(
        f.app.cached_permissions(f.requester.user_id).await,
        vec!["view_lab_results"]
    );
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn single_rejection_settles_the_request() {
    let f = pending_request().await;

    vote(&f.app, &f.first, &f.request_id, "approve").await;
    let rejected: Value = vote(&f.app, &f.second, &f.request_id, "reject")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(rejected["status"], "REJECTED");
    assert_eq!(f.app.count_grants(f.requester.user_id, "view_lab_results").await, 0);

    let late = vote(&f.app, &f.first, &f.request_id, "approve").await;
    assert_eq!(late.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn approver_cannot_vote_twice() {
    let f = pending_request().await;

    assert_eq!(vote(&f.app, &f.first, &f.request_id, "approve").await.status(), 200);
    assert_eq!(vote(&f.app, &f.first, &f.request_id, "approve").await.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn outsider_cannot_vote() {
    let f = pending_request().await;
    let outsider = f.app.seed_staff(&[APPROVER]).await;

    assert_eq!(vote(&f.app, &outsider, &f.request_id, "approve").await.status(), 403);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn only_the_requester_can_cancel() {
    let f = pending_request().await;
    let cancel_url = f
        .app
        .url(&format!("/permission-requests/{}/cancel", f.request_id));

    let by_approver = f
        .app
        .client()
        .post(&cancel_url)
        .bearer_auth(&f.first.token)
        .send()
        .await
        .unwrap();
    assert_eq!(by_approver.status(), 403);

    let by_requester = f
        .app
        .client()
        .post(&cancel_url)
        .bearer_auth(&f.requester.token)
        .send()
        .await
        .unwrap();
    assert_eq!(by_requester.status(), 200);
    let body: Value = by_requester.json().await.unwrap();
    assert_eq!(body["status"], "CANCELLED");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn expired_request_refuses_votes_and_is_swept() {
    let f = pending_request().await;
    f.app.backdate_request(f.request_id.parse().unwrap()).await;

    assert_eq!(vote(&f.app, &f.first, &f.request_id, "approve").await.status(), 409);

    let admin = f.app.seed_staff(&["admin"]).await;
    let swept: Value = f
        .app
        .client()
        .post(f.app.url("/permission-requests/cleanup"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(swept["request_ids"]
        .as_array()
        .unwrap()
        .iter()
        .any(|id| id.as_str() == Some(f.request_id.as_str())));

    let request: Value = f
        .app
        .client()
        .get(f.app.url(&format!("/permission-requests/{}", f.request_id)))
        .bearer_auth(&f.requester.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(request["status"], "EXPIRED");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn duplicate_pending_request_is_conflict() {
    let f = pending_request().await;

    let again = file_request(&f.app, &f.requester, &[&f.first]).await;
    assert_eq!(again.status(), 409);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn approvers_must_hold_the_approval_permission() {
    let app = TestApp::spawn().await.unwrap();
    let requester = app.seed_staff(&[]).await;
    let colleague = app.seed_staff(&[]).await;

    let response = file_request(&app, &requester, &[&colleague]).await;
    assert_eq!(response.status(), 400);

    let own = file_request(&app, &requester, &[&requester]).await;
    assert_eq!(own.status(), 400);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn pending_approval_lists_requests_awaiting_the_caller() {
    let f = pending_request().await;

    let waiting: Vec<Value> = f
        .app
        .client()
        .get(f.app.url("/permission-requests/pending-approval"))
        .bearer_auth(&f.first.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(waiting.iter().any(|r| r["request_id"] == f.request_id.as_str()));

    vote(&f.app, &f.first, &f.request_id, "approve").await;

    let waiting: Vec<Value> = f
        .app
        .client()
        .get(f.app.url("/permission-requests/pending-approval"))
        .bearer_auth(&f.first.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!waiting.iter().any(|r| r["request_id"] == f.request_id.as_str()));
}
