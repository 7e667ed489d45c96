/// End-to-end tests for the HTTP surface
///
/// These drive the full router (auth layer, validation, error mapping,
/// security headers) against the in-memory store and observe realtime events
/// on hub connections.
///
/// Run with: cargo test --test api_scenarios_tests

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{event_kinds, TestContext};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let (status, body) = ctx.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let ctx = TestContext::new();

    let (status, body) = ctx.request(Method::GET, "/v1/teams", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let mut forged = ctx.user("Mallory");
    forged.token.push('x');
    let (status, body) = ctx.get("/v1/teams", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let ctx = TestContext::new();
    let response = ctx
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_blocked_task_flow() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia");
    let ari = ctx.user("Ari");
    let team = ctx.create_team(&mia, "Eng").await;
    ctx.add_member(&mia, team, &ari).await;
    let mut feed = ctx.listen(&mia, &[team]);

    // Members cannot create tasks
    let (status, body) = ctx
        .post(
            &format!("/v1/teams/{}/tasks", team),
            &ari,
            json!({ "title": "Self-assigned" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["gate"], "role");

    let (status, task) = ctx
        .post(
            &format!("/v1/teams/{}/tasks", team),
            &mia,
            json!({
                "title": "Rotate credentials",
                "priority": "high",
                "due_date": "2026-11-02",
                "assignee_id": ari.id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", task);
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "high");
    let task_id = task["id"].as_str().unwrap().to_string();

    // Blocked without an explanation is refused and changes nothing
    let (status, body) = ctx
        .patch(
            &format!("/v1/tasks/{}/status", task_id),
            &ari,
            json!({ "status": "blocked" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (_, current) = ctx.get(&format!("/v1/tasks/{}", task_id), &ari).await;
    assert_eq!(current["status"], "todo");

    let (status, blocked) = ctx
        .patch(
            &format!("/v1/tasks/{}/status", task_id),
            &ari,
            json!({ "status": "blocked", "comment": "Vault is down" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", blocked);
    assert_eq!(blocked["status"], "blocked");

    let (status, comments) = ctx
        .get(&format!("/v1/tasks/{}/comments", task_id), &mia)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comments["comments"][0]["content"], "Vault is down");

    assert_eq!(
        event_kinds(&mut feed),
        vec!["task:created", "task:status_changed", "comment:added"]
    );
}

#[tokio::test]
async fn test_status_cannot_be_set_through_task_edit() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia");
    let team = ctx.create_team(&mia, "Eng").await;
    let (_, task) = ctx
        .post(
            &format!("/v1/teams/{}/tasks", team),
            &mia,
            json!({ "title": "Audit" }),
        )
        .await;

    let (status, body) = ctx
        .patch(
            &format!("/v1/tasks/{}", task["id"].as_str().unwrap()),
            &mia,
            json!({ "status": "blocked" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = ctx
        .patch(
            &format!("/v1/tasks/{}/status", task["id"].as_str().unwrap()),
            &mia,
            json!({ "status": "archived" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_last_manager_protection_over_http() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia");
    let ari = ctx.user("Ari");
    let team = ctx.create_team(&mia, "Eng").await;
    ctx.add_member(&mia, team, &ari).await;

    let (status, body) = ctx
        .delete(&format!("/v1/teams/{}/members/{}", team, mia.id), &mia)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invariant_violation");

    let (status, body) = ctx
        .patch(
            &format!("/v1/teams/{}/members/{}/role", team, mia.id),
            &mia,
            json!({ "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invariant_violation");

    let mut feed = ctx.listen(&ari, &[team]);
    let (status, body) = ctx
        .post(&format!("/v1/teams/{}/leave", team), &mia, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "team_deleted");
    assert_eq!(event_kinds(&mut feed), vec!["team:deleted"]);

    let (status, _) = ctx.get(&format!("/v1/teams/{}", team), &ari).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_roster_management() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia");
    let ari = ctx.user("Ari");
    let team = ctx.create_team(&mia, "Eng").await;
    ctx.add_member(&mia, team, &ari).await;

    let (status, body) = ctx
        .post(
            &format!("/v1/teams/{}/members", team),
            &mia,
            json!({ "user_id": ari.id }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = ctx
        .post(
            &format!("/v1/teams/{}/members", team),
            &mia,
            json!({ "email": "nobody@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

    let (status, promoted) = ctx
        .patch(
            &format!("/v1/teams/{}/members/{}/role", team, ari.id),
            &mia,
            json!({ "role": "manager" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "manager");

    // With a second manager the first can step down
    let (status, _) = ctx
        .patch(
            &format!("/v1/teams/{}/members/{}/role", team, mia.id),
            &ari,
            json!({ "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, members) = ctx.get(&format!("/v1/teams/{}/members", team), &mia).await;
    assert_eq!(status, StatusCode::OK);
    let roles: Vec<&str> = members["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["member", "manager"]);
}

#[tokio::test]
async fn test_outsider_hits_membership_gate() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia");
    let olly = ctx.user("Olly");
    let team = ctx.create_team(&mia, "Eng").await;

    let (status, body) = ctx.get(&format!("/v1/teams/{}/tasks", team), &olly).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["gate"], "membership");

    let (status, _) = ctx
        .get(&format!("/v1/teams/{}/tasks", Uuid::new_v4()), &olly)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_validation() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia");

    let (status, body) = ctx
        .post("/v1/teams", &mia, json!({ "name": "x".repeat(256) }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "name");

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/v1/teams")
                .header("authorization", mia.auth_header())
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name": "#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_comment_permissions_over_http() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia");
    let ari = ctx.user("Ari");
    let team = ctx.create_team(&mia, "Eng").await;
    ctx.add_member(&mia, team, &ari).await;
    let (_, task) = ctx
        .post(
            &format!("/v1/teams/{}/tasks", team),
            &mia,
            json!({ "title": "Docs" }),
        )
        .await;
    let task_id = task["id"].as_str().unwrap();

    let (status, comment) = ctx
        .post(
            &format!("/v1/tasks/{}/comments", task_id),
            &ari,
            json!({ "content": "Draft is up" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = comment["id"].as_str().unwrap();

    let (status, body) = ctx
        .patch(
            &format!("/v1/comments/{}", comment_id),
            &mia,
            json!({ "content": "Rewritten" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["gate"], "ownership");

    let (status, body) = ctx.delete(&format!("/v1/comments/{}", comment_id), &mia).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
}

#[tokio::test]
async fn test_realtime_handshake_requires_token() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia");

    let (status, body) = ctx
        .request(Method::GET, "/v1/realtime", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    // A valid token passes authentication; this plain request then fails
    // because it is not a WebSocket upgrade
    let (status, body) = ctx
        .request(
            Method::GET,
            &format!("/v1/realtime?token={}", mia.token),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(ctx.state.hub().connection_count(), 0);
}
