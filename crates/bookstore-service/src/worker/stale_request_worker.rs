//! 过期申请处理 Worker
//!
//! 长时间没有任何变动的未结申请置为 expired，释放同一商品的未结申请名额。
//! 提交付款凭证会重新计时。

use std::time::Duration;

use bookstore_shared::config::WorkerConfig;
use bookstore_shared::observability::metrics;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info};

use crate::service::purchase_workflow;

pub struct StaleRequestWorker {
    pool: PgPool,
    poll_interval: Duration,
    /// 超过该天数没有变动的未结申请视为过期
    max_age_days: i64,
}

impl StaleRequestWorker {
    pub fn new(pool: PgPool, poll_interval_secs: u64, max_age_days: i64) -> Self {
        Self {
            pool,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            max_age_days: max_age_days.max(1),
        }
    }

    pub fn from_config(pool: PgPool, config: &WorkerConfig) -> Self {
        Self::new(
            pool,
            config.stale_request_interval_secs,
            config.stale_request_days,
        )
    }

    pub async fn run(&self) {
        info!(
            poll_interval = ?self.poll_interval,
            max_age_days = self.max_age_days,
            "StaleRequestWorker started"
        );

        loop {
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Stale request expiry failed");
            }
            metrics::set_worker_last_run("stale_request_worker");

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn run_once(&self) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now() - chrono::Duration::days(self.max_age_days);
        let expired = purchase_workflow::expire_stale(&self.pool, cutoff).await?;
        if expired > 0 {
            info!(expired, %cutoff, "Stale purchase requests expired");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_worker_from_config() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let config = WorkerConfig {
            stale_request_interval_secs: 1800,
            stale_request_days: 7,
            ..WorkerConfig::default()
        };
        let worker = StaleRequestWorker::from_config(pool, &config);

        assert_eq!(worker.poll_interval.as_secs(), 1800);
        assert_eq!(worker.max_age_days, 7);
    }

    #[tokio::test]
    async fn test_max_age_at_least_one_day() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let worker = StaleRequestWorker::new(pool, 60, 0);
        assert_eq!(worker.max_age_days, 1);
    }
}
