//! 分级限流中间件
//!
//! 基于 Redis 固定窗口计数器实现请求限流，按接口类型分级：
//! - 上传（付款凭证提交）: 最严格，默认 10 req/min
//! - 写操作（POST/PUT/PATCH/DELETE）: 默认 60 req/min
//! - 读操作（GET）: 默认 300 req/min
//!
//! 已登录用户按用户 ID 计数，匿名请求按客户端 IP 计数。

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

use super::audit::extract_client_ip;
use crate::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateLimit {
    max_requests: i64,
    window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateTier {
    Upload,
    Write,
    Read,
}

impl RateTier {
    fn classify(path: &str, method: &Method) -> Self {
        if path.starts_with("/api/payments/submit") {
            return Self::Upload;
        }
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Self::Read,
            _ => Self::Write,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Write => "write",
            Self::Read => "read",
        }
    }

    fn limit(&self) -> RateLimit {
        match self {
            Self::Upload => RateLimit {
                max_requests: 10,
                window_secs: 60,
            },
            Self::Write => RateLimit {
                max_requests: 60,
                window_secs: 60,
            },
            Self::Read => RateLimit {
                max_requests: 300,
                window_secs: 60,
            },
        }
    }
}

/// 限流中间件
///
/// 放在 auth 中间件之内（需要 Claims），audit 中间件之外（被限流的请求不记审计）。
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_exempt_path(&path) {
        return next.run(request).await;
    }

    let tier = RateTier::classify(&path, request.method());
    let limit = tier.limit();

    let subject = match request.extensions().get::<Claims>() {
        Some(claims) => format!("user:{}", claims.sub),
        None => format!(
            "ip:{}",
            extract_client_ip(&request).unwrap_or_else(|| "unknown".to_string())
        ),
    };
    let key = format!(
        "rl:{}:{}:{}",
        subject,
        tier.name(),
        window_key(limit.window_secs)
    );

    match state
        .cache
        .incr_with_expire(&key, Duration::from_secs(limit.window_secs))
        .await
    {
        Ok(count) if count > limit.max_requests => {
            warn!(subject = %subject, path = %path, tier = tier.name(), "Rate limit exceeded");
            return too_many_requests_response(limit.window_secs);
        }
        Ok(_) => {}
        Err(e) => {
            // Redis 不可用时放行
            warn!(error = %e, "Rate limit check failed, allowing request");
        }
    }

    next.run(request).await
}

/// 以窗口大小对齐的时间戳，同一窗口内的请求共享计数器
fn window_key(window_secs: u64) -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now / window_secs
}

/// Telegram 的推送由 secret 校验保护，不参与限流
fn is_exempt_path(path: &str) -> bool {
    matches!(path, "/health" | "/ready") || path.starts_with("/api/telegram/webhook")
}

fn too_many_requests_response(window_secs: u64) -> Response {
    let body = json!({
        "success": false,
        "code": "RATE_LIMITED",
        "message": "请求过于频繁，请稍后重试",
        "data": null
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    if let Ok(val) = HeaderValue::from_str(&window_secs.to_string()) {
        response.headers_mut().insert("Retry-After", val);
    }
    response
}
