//! HTTP 请求处理器模块
//!
//! 用户端、后台与 Telegram webhook 的全部 REST 端点

pub mod audit_log;
pub mod auth;
pub mod book;
pub mod bundle;
pub mod library;
pub mod payment;
pub mod payment_config;
pub mod purchase_request;
pub mod push;
pub mod stats;
pub mod telegram;
pub mod user;

use axum::{
    body::Body,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

/// 私有文件响应（图书文件、付款截图），禁止缓存
pub(crate) fn file_response(bytes: Vec<u8>, content_type: &str) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let len = bytes.len();

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, no-store")),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
        ],
        Body::from(bytes),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_response_headers() {
        let response = file_response(vec![0u8; 5], "application/pdf");
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(headers[header::CACHE_CONTROL], "private, no-store");
        assert_eq!(headers[header::CONTENT_LENGTH], "5");
    }
}
