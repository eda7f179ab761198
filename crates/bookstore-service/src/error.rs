//! 书店服务错误类型定义
//!
//! 所有 HTTP 接口统一返回 `{success, code, message, data}` 结构的错误体

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bookstore_shared::error::BookstoreError;
use serde_json::json;
use uuid::Uuid;

use crate::models::PurchaseStatus;
use crate::storage::StorageError;

/// 书店服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 认证错误
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("禁止访问: {0}")]
    Forbidden(String),
    #[error("邮箱或密码错误")]
    InvalidCredentials,

    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 资源不存在
    #[error("图书不存在: {0}")]
    BookNotFound(Uuid),
    #[error("套装不存在: {0}")]
    BundleNotFound(Uuid),
    #[error("购买申请不存在: {0}")]
    PurchaseRequestNotFound(Uuid),
    #[error("资源不存在: {0}")]
    NotFound(String),

    // 业务冲突
    #[error("邮箱已被注册")]
    EmailTaken,
    #[error("您已拥有该商品")]
    AlreadyOwned,
    #[error("该商品已有未完成的购买申请")]
    DuplicateRequest,
    #[error("申请状态不允许从 {from} 变更为 {to}")]
    InvalidTransition {
        from: PurchaseStatus,
        to: PurchaseStatus,
    },
    #[error("操作冲突: {0}")]
    Conflict(String),

    // 阅读令牌
    #[error("阅读链接已过期")]
    TokenExpired,

    // 上传
    #[error("文件过大，最大允许 {0} 字节")]
    PayloadTooLarge(usize),
    #[error("不支持的文件类型: {0}")]
    UnsupportedMediaType(String),

    #[error("请求过于频繁，请稍后重试")]
    RateLimited,

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Redis错误: {0}")]
    Redis(String),
    #[error("存储错误: {0}")]
    Storage(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            Self::Validation(_) => StatusCode::BAD_REQUEST,

            Self::BookNotFound(_)
            | Self::BundleNotFound(_)
            | Self::PurchaseRequestNotFound(_)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,

            Self::EmailTaken
            | Self::AlreadyOwned
            | Self::DuplicateRequest
            | Self::InvalidTransition { .. }
            | Self::Conflict(_) => StatusCode::CONFLICT,

            Self::TokenExpired => StatusCode::GONE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            Self::Database(_) | Self::Redis(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BookNotFound(_) => "BOOK_NOT_FOUND",
            Self::BundleNotFound(_) => "BUNDLE_NOT_FOUND",
            Self::PurchaseRequestNotFound(_) => "PURCHASE_REQUEST_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::AlreadyOwned => "ALREADY_OWNED",
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::Conflict(_) => "CONFLICT",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::RateLimited => "RATE_LIMITED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database operation failed");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Redis(e) => {
                tracing::error!(error = %e, "Redis operation failed");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Storage(e) => {
                tracing::error!(error = %e, "Object storage operation failed");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON 处理错误: {}", err))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Validation(format!("表单解析失败: {}", err.body_text()))
    }
}

impl From<BookstoreError> for ApiError {
    fn from(err: BookstoreError) -> Self {
        match err {
            BookstoreError::Database(e) => Self::Database(e),
            BookstoreError::Redis(e) => Self::Redis(e.to_string()),
            BookstoreError::NotFound { entity, id } => Self::NotFound(format!("{} {}", entity, id)),
            BookstoreError::AlreadyExists { entity, field, value } => {
                Self::Conflict(format!("{} {}={} 已存在", entity, field, value))
            }
            BookstoreError::Validation(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(key) => Self::Validation(format!("非法的存储路径: {}", key)),
            StorageError::NotFound(key) => Self::NotFound(format!("文件 {}", key)),
            StorageError::Io(e) => Self::Storage(e.to_string()),
        }
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(ApiError, StatusCode, &'static str)> {
        let id = Uuid::nil();
        vec![
            (ApiError::Unauthorized("no token".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (ApiError::Forbidden("admin only".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            (ApiError::Validation("title is required".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (ApiError::BookNotFound(id), StatusCode::NOT_FOUND, "BOOK_NOT_FOUND"),
            (ApiError::BundleNotFound(id), StatusCode::NOT_FOUND, "BUNDLE_NOT_FOUND"),
            (ApiError::PurchaseRequestNotFound(id), StatusCode::NOT_FOUND, "PURCHASE_REQUEST_NOT_FOUND"),
            (ApiError::NotFound("wallet 3".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (ApiError::EmailTaken, StatusCode::CONFLICT, "EMAIL_TAKEN"),
            (ApiError::AlreadyOwned, StatusCode::CONFLICT, "ALREADY_OWNED"),
            (ApiError::DuplicateRequest, StatusCode::CONFLICT, "DUPLICATE_REQUEST"),
            (
                ApiError::InvalidTransition {
                    from: PurchaseStatus::Rejected,
                    to: PurchaseStatus::Approved,
                },
                StatusCode::CONFLICT,
                "INVALID_STATUS_TRANSITION",
            ),
            (ApiError::Conflict("book in library".into()), StatusCode::CONFLICT, "CONFLICT"),
            (ApiError::TokenExpired, StatusCode::GONE, "TOKEN_EXPIRED"),
            (ApiError::PayloadTooLarge(1024), StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            (ApiError::UnsupportedMediaType("image/gif".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE"),
            (ApiError::RateLimited, StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            (ApiError::Redis("connection refused".into()), StatusCode::INTERNAL_SERVER_ERROR, "REDIS_ERROR"),
            (ApiError::Storage("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            (ApiError::Internal("unexpected state".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ]
    }

    #[test]
    fn test_all_variants_status_and_code() {
        for (error, expected_status, expected_code) in all_error_variants() {
            assert_eq!(error.status_code(), expected_status, "status mismatch: {expected_code}");
            assert_eq!(error.error_code(), expected_code);
        }
    }

    #[test]
    fn test_transition_error_mentions_both_states() {
        let err = ApiError::InvalidTransition {
            from: PurchaseStatus::Rejected,
            to: PurchaseStatus::Approved,
        };
        let msg = err.to_string();
        assert!(msg.contains("rejected"));
        assert!(msg.contains("approved"));
    }

    #[test]
    fn test_bookstore_error_conversion() {
        let err: ApiError = BookstoreError::Validation("bad".into()).into();
        assert!(matches!(err, ApiError::Validation(_)));

        let err: ApiError = BookstoreError::Database(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, ApiError::Database(_)));

        let err: ApiError = BookstoreError::CacheSerialization("eof".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: ApiError = StorageError::InvalidKey("../etc/passwd".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: ApiError = StorageError::NotFound("books/a.pdf".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_into_response_body_structure() {
        for (error, expected_status, expected_code) in all_error_variants() {
            let response = error.into_response();
            assert_eq!(response.status(), expected_status);

            let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("读取响应体失败");
            let body: serde_json::Value =
                serde_json::from_slice(&body_bytes).expect("响应体不是合法 JSON");

            assert_eq!(body["success"], false);
            assert_eq!(body["code"], expected_code);
            assert!(body["message"].is_string());
            assert!(body["data"].is_null());
        }
    }

    #[tokio::test]
    async fn test_system_errors_hide_details() {
        let response = ApiError::Internal("secret stack trace".into()).into_response();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }
}
