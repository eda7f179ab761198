//! 阅读令牌清理 Worker
//!
//! 定期删除已过期的阅读令牌。过期后保留一段宽限期，便于排查刚失效的链接。

use std::time::Duration;

use bookstore_shared::config::WorkerConfig;
use bookstore_shared::observability::metrics;
use sqlx::PgPool;
use tracing::{error, info};

use crate::service::reading_token;

pub struct ReadingTokenCleanupWorker {
    pool: PgPool,
    poll_interval: Duration,
    /// 过期多久之后才删除
    grace: chrono::Duration,
}

impl ReadingTokenCleanupWorker {
    pub fn new(pool: PgPool, poll_interval_secs: u64, grace: chrono::Duration) -> Self {
        Self {
            pool,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            grace,
        }
    }

    pub fn from_config(pool: PgPool, config: &WorkerConfig) -> Self {
        Self::new(
            pool,
            config.token_cleanup_interval_secs,
            chrono::Duration::hours(1),
        )
    }

    pub async fn run(&self) {
        info!(
            poll_interval = ?self.poll_interval,
            grace_secs = self.grace.num_seconds(),
            "ReadingTokenCleanupWorker started"
        );

        loop {
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Reading token cleanup failed");
            }
            metrics::set_worker_last_run("token_cleanup_worker");

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 执行一轮清理，返回删除数量
    pub async fn run_once(&self) -> Result<u64, sqlx::Error> {
        let deleted = reading_token::delete_expired(&self.pool, self.grace).await?;
        if deleted > 0 {
            info!(deleted, "Expired reading tokens removed");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_worker_from_config() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let config = WorkerConfig {
            token_cleanup_interval_secs: 900,
            ..WorkerConfig::default()
        };
        let worker = ReadingTokenCleanupWorker::from_config(pool, &config);

        assert_eq!(worker.poll_interval.as_secs(), 900);
        assert_eq!(worker.grace, chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn test_zero_interval_clamped() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let worker = ReadingTokenCleanupWorker::new(pool, 0, chrono::Duration::zero());
        assert_eq!(worker.poll_interval.as_secs(), 1);
    }
}
