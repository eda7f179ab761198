//! Redis 缓存管理模块
//!
//! 提供 Redis 连接管理和常用缓存操作封装：目录查询缓存与限流计数。

use crate::config::RedisConfig;
use crate::error::{BookstoreError, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{info, instrument};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端（此时不建立连接）
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(BookstoreError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(BookstoreError::from)
    }

    /// 获取值
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => {
                let parsed: T = serde_json::from_str(&v)
                    .map_err(|e| BookstoreError::CacheSerialization(e.to_string()))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// 设置值
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let serialized = serde_json::to_string(value)
            .map_err(|e| BookstoreError::CacheSerialization(e.to_string()))?;

        let _: () = conn.set_ex(key, serialized, ttl.as_secs()).await?;
        Ok(())
    }

    /// 删除值
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// 批量删除（按模式）
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.get_conn().await?;
        let keys: Vec<String> = conn.keys(pattern).await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let count: u64 = conn.del(keys).await?;
        Ok(count)
    }

    /// 计数器自增；首次创建时设置过期时间
    ///
    /// 返回自增后的值，用于固定窗口限流。
    pub async fn incr_with_expire(&self, key: &str, ttl: Duration) -> Result<i64> {
        let mut conn = self.get_conn().await?;
        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(key, ttl.as_secs() as i64).await?;
        }
        Ok(count)
    }
}

/// 缓存键生成器
pub struct CacheKey;

impl CacheKey {
    /// 目录类缓存统一前缀，后台写操作按此前缀整体失效
    pub const CATALOG_PATTERN: &'static str = "catalog:*";

    pub fn book_list(search: Option<&str>, page: i64, page_size: i64) -> String {
        format!(
            "catalog:books:{}:{}:{}",
            search.unwrap_or("").trim().to_lowercase(),
            page,
            page_size
        )
    }

    pub fn book_detail(book_id: &str) -> String {
        format!("catalog:book:{}", book_id)
    }

    pub fn bundle_list() -> String {
        "catalog:bundles".to_string()
    }

    pub fn bundle_detail(bundle_id: &str) -> String {
        format!("catalog:bundle:{}", bundle_id)
    }

    pub fn payment_config() -> String {
        "catalog:payment-config".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_generation() {
        assert_eq!(
            CacheKey::book_list(Some("  Rust "), 2, 20),
            "catalog:books:rust:2:20"
        );
        assert_eq!(CacheKey::book_list(None, 1, 10), "catalog:books::1:10");
        assert_eq!(CacheKey::book_detail("abc"), "catalog:book:abc");
        assert_eq!(CacheKey::bundle_detail("b1"), "catalog:bundle:b1");
    }

    #[test]
    fn test_catalog_keys_share_invalidation_prefix() {
        let prefix = CacheKey::CATALOG_PATTERN.trim_end_matches('*');
        for key in [
            CacheKey::book_list(None, 1, 20),
            CacheKey::book_detail("x"),
            CacheKey::bundle_list(),
            CacheKey::bundle_detail("y"),
            CacheKey::payment_config(),
        ] {
            assert!(key.starts_with(prefix), "{key} must be invalidated by catalog writes");
        }
    }

    #[test]
    fn test_client_creation_does_not_connect() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 1,
        };
        assert!(Cache::new(&config).is_ok());
    }
}
