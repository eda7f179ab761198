//! 路由与中间件集成测试
//!
//! 只覆盖在访问数据库之前就能确定结果的路径：健康检查、认证、管理员权限、
//! webhook secret 校验与安全响应头。

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bookstore_service::models::UserRole;
use bookstore_shared::test_utils::TestDataGenerator;
use serde_json::json;
use uuid::Uuid;

use common::*;

#[tokio::test]
async fn test_health_has_security_headers() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(lazy_state(dir.path()));

    let response = send(&app, get_request("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(lazy_state(dir.path()));

    let response = send(&app, get_request("/api/library", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_invalid_token_rejected_on_protected_route() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(lazy_state(dir.path()));

    let response = send(
        &app,
        get_request("/api/purchase-requests", Some("Bearer not-a-jwt")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_catalog_write_is_not_public() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(lazy_state(dir.path()));

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/books",
            None,
            &TestDataGenerator::book("Unauthorized", 1000),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_route_forbidden_for_user() {
    let dir = tempfile::tempdir().unwrap();
    let state = lazy_state(dir.path());
    let token = bearer(&state, Uuid::new_v4(), "reader@example.com", UserRole::User);
    let app = app(state);

    let response = send(&app, get_request("/api/admin/stats", Some(&token))).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_payment_submit_requires_token() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(lazy_state(dir.path()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/submit")
        .header("content-type", "multipart/form-data; boundary=X")
        .body(Body::from("--X--\r\n"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_rejects_wrong_secret() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(lazy_state(dir.path()));

    let mut request = json_request(
        "POST",
        "/api/telegram/webhook",
        None,
        &TestDataGenerator::telegram_text_update(7, "/help"),
    );
    request
        .headers_mut()
        .insert("x-telegram-bot-api-secret-token", "wrong".parse().unwrap());

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_acknowledges_non_message_update() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(lazy_state(dir.path()));

    let mut request = json_request("POST", "/api/telegram/webhook", None, &json!({ "update_id": 1 }));
    request
        .headers_mut()
        .insert("x-telegram-bot-api-secret-token", WEBHOOK_SECRET.parse().unwrap());

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn test_webhook_acknowledges_garbage_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(lazy_state(dir.path()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/telegram/webhook")
        .header("x-telegram-bot-api-secret-token", WEBHOOK_SECRET)
        .body(Body::from("not json"))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_with_valid_token() {
    let dir = tempfile::tempdir().unwrap();
    let state = lazy_state(dir.path());
    let token = bearer(&state, Uuid::new_v4(), "reader@example.com", UserRole::User);
    let app = app(state);

    let response = send(
        &app,
        json_request("POST", "/api/auth/logout", Some(&token), &json!({})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["success"], true);
}
