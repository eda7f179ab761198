//! HTTP 安全头

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// 为所有响应注入基础安全头
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "strict-transport-security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    // 依赖 CSP，显式关闭旧的 XSS 过滤器
    headers.insert("x-xss-protection", HeaderValue::from_static("0"));
    response
}
