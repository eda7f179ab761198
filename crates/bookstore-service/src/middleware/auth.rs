//! JWT 认证中间件
//!
//! 验证请求中的 Bearer Token 并将用户信息注入请求扩展

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

use crate::auth::Claims;
use crate::state::AppState;

/// 无需登录即可访问的路由前缀
const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/ready",
    "/api/auth/login",
    "/api/auth/register",
    "/api/telegram/webhook",
    "/api/receipts/",
    "/api/read/",
];

/// 仅 GET 公开的目录类路由
const PUBLIC_READ_PATHS: &[&str] = &["/api/books", "/api/bundles", "/api/payment-config"];

/// 认证中间件
///
/// 从 Authorization header 中提取 Bearer Token，验证后将 Claims 注入请求扩展。
/// 公开路由不要求 Token；携带了有效 Token 时同样注入 Claims，无效 Token 按匿名处理。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let public = is_public_path(request.uri().path(), request.method());

    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let Some(token) = token else {
        if public {
            return next.run(request).await;
        }
        return unauthorized_response("缺少认证 Token");
    };

    match state.jwt_manager.verify_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) if public => {
            debug!(error = %e, "Ignoring invalid token on public route");
            next.run(request).await
        }
        Err(e) => unauthorized_response(&e.to_string()),
    }
}

/// 管理员权限检查，挂在 `/api/admin` 路由组上
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<Claims>() {
        None => unauthorized_response("未认证"),
        Some(claims) if claims.is_admin() => next.run(request).await,
        Some(_) => forbidden_response("需要管理员权限"),
    }
}

pub(crate) fn is_public_path(path: &str, method: &Method) -> bool {
    if PUBLIC_PATHS.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    matches!(*method, Method::GET | Method::HEAD)
        && PUBLIC_READ_PATHS.iter().any(|p| path.starts_with(p))
}

/// 生成 401 未授权响应
fn unauthorized_response(message: &str) -> Response {
    let body = json!({
        "success": false,
        "code": "UNAUTHORIZED",
        "message": message,
        "data": null
    });

    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

fn forbidden_response(message: &str) -> Response {
    let body = json!({
        "success": false,
        "code": "FORBIDDEN",
        "message": message,
        "data": null
    });

    (StatusCode::FORBIDDEN, axum::Json(body)).into_response()
}
