//! 日志与分布式追踪初始化
//!
//! 日志统一走 tracing-subscriber；配置了 OTLP 端点时额外挂载 OpenTelemetry 层，
//! 将 span 导出到 Jaeger/Tempo 等后端。

use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, SdkTracerProvider},
};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::ObservabilityConfig;

/// Tracing 资源守卫
///
/// 持有 TracerProvider，在 Drop 时优雅关闭并刷新待发送的 span。
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
    }
}

/// 初始化 tracing（日志 + 追踪）
pub fn init(config: &ObservabilityConfig) -> Result<TracingGuard> {
    let env_filter = build_env_filter(&config.log_level);

    let fmt_layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    match &config.otlp_endpoint {
        Some(endpoint) => {
            let provider = init_tracer_provider(&config.service_name, endpoint)?;
            let tracer = provider.tracer(config.service_name.clone());
            subscriber
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
            Ok(TracingGuard {
                provider: Some(provider),
            })
        }
        None => {
            subscriber.try_init()?;
            Ok(TracingGuard { provider: None })
        }
    }
}

/// RUST_LOG 优先，其次是配置中的日志级别，均无效时退回 info
fn build_env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracer_provider(service_name: &str, endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_string())
                .build(),
        )
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_log_level_falls_back() {
        // 非法指令不应 panic，而是退回默认过滤器
        let filter = build_env_filter("not a [valid directive");
        let _ = filter.to_string();
    }

    #[test]
    fn test_guard_without_provider_drops_cleanly() {
        let guard = TracingGuard { provider: None };
        drop(guard);
    }
}
