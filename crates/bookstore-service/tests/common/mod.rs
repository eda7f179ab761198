//! 集成测试公共工具

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use bookstore_service::{
    AppState, build_router,
    models::UserRole,
    ocr::NoopOcr,
    storage::LocalStorage,
};
use bookstore_shared::{
    cache::Cache,
    config::AppConfig,
    test_utils::{test_database_config, test_redis_config},
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "hook-secret";

pub fn test_config(storage_root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.database = test_database_config();
    config.redis = test_redis_config();
    config.telegram.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    config.storage.root_dir = storage_root.to_string_lossy().to_string();
    config.server.public_base_url = "http://shop.test".to_string();
    config
}

/// 数据库连接延迟建立，不访问数据库的用例无需启动 PostgreSQL
pub fn lazy_state(storage_root: &Path) -> AppState {
    let config = test_config(storage_root);
    let pool = PgPool::connect_lazy(&config.database.url).unwrap();
    state_with_pool(pool, config)
}

pub fn state_with_pool(pool: PgPool, config: AppConfig) -> AppState {
    let cache = Arc::new(Cache::new(&config.redis).unwrap());
    let storage = Arc::new(LocalStorage::new(config.storage.root_dir.clone()));
    AppState::new(pool, cache, config, storage, Arc::new(NoopOcr), None)
}

pub fn app(state: AppState) -> Router {
    build_router(state)
}

pub fn bearer(state: &AppState, user_id: Uuid, email: &str, role: UserRole) -> String {
    let (token, _) = state
        .jwt_manager
        .generate_token(user_id, email, role)
        .unwrap();
    format!("Bearer {}", token)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}
