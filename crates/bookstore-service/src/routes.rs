//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射，并组装中间件栈

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware,
    routing::{get, patch, post, put},
};
use bookstore_shared::observability::middleware as obs_middleware;
use serde_json::{Value, json};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::info;

use crate::handlers;
use crate::middleware::{
    audit_middleware, auth_middleware, rate_limit_middleware, require_admin, security_headers,
};
use crate::state::AppState;

/// multipart 边界与文本字段的额外余量
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// 认证路由
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/refresh", post(handlers::auth::refresh))
}

/// 公开目录与收款配置
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(handlers::book::list_books))
        .route("/books/{id}", get(handlers::book::get_book))
        .route("/bundles", get(handlers::bundle::list_bundles))
        .route("/bundles/{id}", get(handlers::bundle::get_bundle))
        .route(
            "/payment-config",
            get(handlers::payment_config::get_public_config),
        )
}

/// 书架与阅读
pub fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/library", get(handlers::library::list_library))
        .route(
            "/library/{book_id}/access",
            get(handlers::library::check_access),
        )
        .route(
            "/library/{book_id}/reading-token",
            post(handlers::library::issue_reading_token),
        )
        .route("/read/{token}", get(handlers::library::read_book))
}

/// 购买申请、付款凭证与收据
pub fn purchase_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/purchase-requests",
            post(handlers::purchase_request::create_request)
                .get(handlers::purchase_request::list_my_requests),
        )
        .route(
            "/purchase-requests/{id}",
            get(handlers::purchase_request::get_request),
        )
        .route(
            "/purchase-requests/{id}/cancel",
            post(handlers::purchase_request::cancel_request),
        )
        .route(
            "/purchase-requests/{id}/screenshot",
            get(handlers::purchase_request::get_screenshot),
        )
        .route(
            "/payments/submit",
            post(handlers::payment::submit_payment)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD)),
        )
        .route("/receipts/{id}", get(handlers::payment::get_receipt))
}

/// Telegram webhook、绑定码与推送订阅
pub fn integration_routes() -> Router<AppState> {
    Router::new()
        .route("/telegram/webhook", post(handlers::telegram::webhook))
        .route("/telegram/link-code", post(handlers::telegram::link_code))
        .route("/push/subscribe", post(handlers::push::subscribe))
        .route("/push/unsubscribe", post(handlers::push::unsubscribe))
}

/// 后台路由（挂载在 /api/admin，统一要求管理员角色）
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // 图书
        .route(
            "/books",
            get(handlers::book::admin_list_books).post(handlers::book::create_book),
        )
        .route(
            "/books/{id}",
            get(handlers::book::admin_get_book)
                .put(handlers::book::update_book)
                .delete(handlers::book::delete_book),
        )
        .route("/books/{id}/publish", patch(handlers::book::toggle_publish))
        // 套装
        .route(
            "/bundles",
            get(handlers::bundle::admin_list_bundles).post(handlers::bundle::create_bundle),
        )
        .route(
            "/bundles/{id}",
            get(handlers::bundle::admin_get_bundle)
                .put(handlers::bundle::update_bundle)
                .delete(handlers::bundle::delete_bundle),
        )
        .route("/bundles/{id}/books", put(handlers::bundle::set_bundle_books))
        // 购买申请
        .route(
            "/purchase-requests",
            get(handlers::purchase_request::admin_list_requests),
        )
        .route(
            "/purchase-requests/{id}/status",
            patch(handlers::purchase_request::admin_update_status),
        )
        .route(
            "/purchase-requests/{id}/complete",
            post(handlers::purchase_request::complete_purchase),
        )
        .route(
            "/approve-purchase",
            post(handlers::purchase_request::approve_purchase),
        )
        .route(
            "/reject-purchase",
            post(handlers::purchase_request::reject_purchase),
        )
        // 收款配置
        .route(
            "/payment-config",
            get(handlers::payment_config::list_methods)
                .post(handlers::payment_config::create_method),
        )
        .route(
            "/payment-config/{id}",
            put(handlers::payment_config::update_method)
                .delete(handlers::payment_config::delete_method),
        )
        .route(
            "/wallet-config",
            get(handlers::payment_config::list_wallets)
                .post(handlers::payment_config::create_wallet),
        )
        .route(
            "/wallet-config/{id}",
            put(handlers::payment_config::update_wallet)
                .delete(handlers::payment_config::delete_wallet),
        )
        // 看板与系统
        .route("/stats", get(handlers::stats::overview))
        .route("/users", get(handlers::user::list_users))
        .route("/users/{id}/role", patch(handlers::user::update_role))
        .route("/audit-logs", get(handlers::audit_log::list_audit_logs))
        .route(
            "/telegram/set-webhook",
            post(handlers::telegram::set_webhook),
        )
        .route_layer(middleware::from_fn(require_admin))
}

/// 构建完整的 API 路由（挂载在 /api）
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(catalog_routes())
        .merge(library_routes())
        .merge(purchase_routes(max_upload_bytes))
        .merge(integration_routes())
        .nest("/admin", admin_routes())
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins.trim() == "*" {
        info!("CORS allowed_origins: * (all origins)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 组装应用：路由 + 中间件栈
///
/// 中间件从内到外：审计 → 限流 → 安全头 → CORS → 认证 → 追踪 → request id
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .nest("/api", api_routes(config.storage.max_upload_bytes))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.cors.allowed_origins))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_seconds.max(1),
        )))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

/// 存活探针
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "bookstore"
    }))
}

/// 就绪探针：检查数据库和 Redis
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let cache_ok = state.cache.health_check().await.is_ok();
    let all_ok = db_ok && cache_ok;

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if all_ok { "ok" } else { "degraded" },
            "service": "bookstore",
            "checks": {
                "database": if db_ok { "ok" } else { "fail" },
                "redis": if cache_ok { "ok" } else { "fail" }
            }
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_construction() {
        let _auth = auth_routes();
        let _catalog = catalog_routes();
        let _library = library_routes();
        let _purchase = purchase_routes(5 * 1024 * 1024);
        let _integration = integration_routes();
        let _admin = admin_routes();
        let _api = api_routes(5 * 1024 * 1024);
    }

    #[test]
    fn test_cors_layer_variants() {
        let _any = cors_layer("*");
        let _list = cors_layer("http://localhost:3000, https://shop.example.com");
    }
}
