//! 数字书店后端服务入口

use std::sync::Arc;

use anyhow::Context;
use bookstore_service::{
    AppState, build_router,
    ocr,
    storage::{LocalStorage, ObjectStorage},
    telegram::{TelegramApi, TelegramClient},
    worker::{ReadingTokenCleanupWorker, StaleRequestWorker},
};
use bookstore_shared::{cache::Cache, config::AppConfig, database::Database, observability};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("bookstore").context("failed to load configuration")?;
    config.validate_for_production()?;

    let obs_config = config.observability.clone().with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting bookstore on {}", config.server_addr());

    // 初始化基础设施
    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }
    let cache = Arc::new(Cache::new(&config.redis)?);

    let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(&config.storage.root_dir));
    let ocr_engine = ocr::build_engine(&config.ocr)?;

    let telegram: Option<Arc<dyn TelegramApi>> = match TelegramClient::from_config(&config.telegram)? {
        Some(client) => {
            info!(bot = %config.telegram.bot_username, "Telegram bot enabled");
            Some(Arc::new(client))
        }
        None => {
            warn!("Telegram bot token not configured, bot replies and notifications disabled");
            None
        }
    };

    // 启动后台 Worker
    let token_worker = ReadingTokenCleanupWorker::from_config(db.pool().clone(), &config.workers);
    tokio::spawn(async move {
        token_worker.run().await;
    });

    let stale_worker = StaleRequestWorker::from_config(db.pool().clone(), &config.workers);
    tokio::spawn(async move {
        stale_worker.run().await;
    });

    let addr = config.server_addr();
    let state = AppState::new(db.pool().clone(), cache, config, storage, ocr_engine, telegram);
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    // 收到 SIGTERM 或 Ctrl+C 后停止接收新连接，等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
