//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册业务指标描述（出现在 /metrics 的 HELP 注释中）
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "purchase_requests_total",
        "Total number of purchase requests created"
    );
    metrics::describe_counter!(
        "purchase_reviews_total",
        "Total number of admin purchase decisions"
    );
    metrics::describe_counter!(
        "payment_submissions_total",
        "Total number of payment screenshot submissions"
    );
    metrics::describe_counter!(
        "telegram_updates_total",
        "Total number of Telegram webhook updates handled"
    );
    metrics::describe_counter!(
        "reading_tokens_issued_total",
        "Total number of reading tokens issued"
    );
    metrics::describe_counter!(
        "notifications_sent_total",
        "Total number of notification deliveries"
    );
    metrics::describe_gauge!(
        "worker_last_run_timestamp",
        "Unix timestamp of the last background worker pass"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录购买申请创建（source: web / telegram）
#[inline]
pub fn record_purchase_request(source: &str, item_type: &str) {
    metrics::counter!(
        "purchase_requests_total",
        "source" => source.to_string(),
        "item_type" => item_type.to_string()
    )
    .increment(1);
}

/// 记录管理员审核结果（decision: approved / rejected / completed）
#[inline]
pub fn record_purchase_review(decision: &str) {
    metrics::counter!("purchase_reviews_total", "decision" => decision.to_string()).increment(1);
}

/// 记录付款凭证提交
#[inline]
pub fn record_payment_submission(ocr_status: &str) {
    metrics::counter!(
        "payment_submissions_total",
        "ocr" => ocr_status.to_string()
    )
    .increment(1);
}

/// 记录 Telegram 更新处理
#[inline]
pub fn record_telegram_update(command: &str) {
    metrics::counter!("telegram_updates_total", "command" => command.to_string()).increment(1);
}

/// 记录阅读令牌签发
#[inline]
pub fn record_reading_token_issued() {
    metrics::counter!("reading_tokens_issued_total").increment(1);
}

/// 记录通知投递
#[inline]
pub fn record_notification(channel: &str, success: bool) {
    metrics::counter!(
        "notifications_sent_total",
        "channel" => channel.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

/// 记录后台 Worker 最近一次运行时间（Unix 秒）
#[inline]
pub fn set_worker_last_run(worker: &str) {
    metrics::gauge!("worker_last_run_timestamp", "worker" => worker.to_string())
        .set(chrono::Utc::now().timestamp() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        record_http_request("GET", "/api/books", 200, 0.1);
        record_purchase_request("web", "book");
        record_purchase_review("approved");
        record_payment_submission("skipped");
        record_telegram_update("start");
        record_reading_token_issued();
        record_notification("telegram", true);
        set_worker_last_run("token_cleanup");
        assert!(get_handle().is_none());
    }
}
