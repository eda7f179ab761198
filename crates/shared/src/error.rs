//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum BookstoreError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} {field}={value}")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },

    // ==================== 缓存错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("缓存序列化失败: {0}")]
    CacheSerialization(String),

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("外部服务超时: {service}")]
    ExternalServiceTimeout { service: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, BookstoreError>;

impl BookstoreError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Redis(_) => "REDIS_ERROR",
            Self::CacheSerialization(_) => "CACHE_SERIALIZATION_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::ExternalServiceTimeout { .. } => "EXTERNAL_SERVICE_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Redis(_) | Self::ExternalServiceTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = BookstoreError::NotFound {
            entity: "Book".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "记录未找到: Book id=42");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = BookstoreError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let timeout = BookstoreError::ExternalServiceTimeout {
            service: "telegram".to_string(),
        };
        assert!(timeout.is_retryable());

        let validation = BookstoreError::Validation("bad".to_string());
        assert!(!validation.is_retryable());
    }
}
