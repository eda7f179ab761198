//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use bookstore_shared::cache::Cache;
use bookstore_shared::config::AppConfig;
use sqlx::PgPool;

use crate::auth::{JwtConfig, JwtManager};
use crate::notification::NotificationService;
use crate::ocr::{OcrEngine, ReceiptParser};
use crate::storage::ObjectStorage;
use crate::telegram::{TelegramApi, TelegramDispatcher};

/// Axum 应用共享状态
///
/// 所有外部依赖都以 trait object 注入，测试时可替换为 mock
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL 连接池
    pub pool: PgPool,
    /// Redis 缓存客户端（目录缓存与限流计数）
    pub cache: Arc<Cache>,
    pub config: Arc<AppConfig>,
    pub jwt_manager: Arc<JwtManager>,
    /// 截图与图书文件
    pub storage: Arc<dyn ObjectStorage>,
    pub ocr: Arc<dyn OcrEngine>,
    pub receipt_parser: Arc<ReceiptParser>,
    /// 未配置 bot token 时为空
    pub telegram: Option<Arc<dyn TelegramApi>>,
    pub notifier: Arc<NotificationService>,
    pub dispatcher: Arc<TelegramDispatcher>,
}

impl AppState {
    /// 组装应用状态，通知服务与 Telegram 分发器由已有依赖派生
    pub fn new(
        pool: PgPool,
        cache: Arc<Cache>,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        ocr: Arc<dyn OcrEngine>,
        telegram: Option<Arc<dyn TelegramApi>>,
    ) -> Self {
        let jwt_manager = Arc::new(JwtManager::new(JwtConfig::from(config.auth.clone())));
        let notifier = Arc::new(NotificationService::with_defaults(
            telegram.clone(),
            config.telegram.admin_chat_id,
        ));
        let dispatcher = Arc::new(TelegramDispatcher::new(
            pool.clone(),
            telegram.clone(),
            notifier.clone(),
            config.telegram.clone(),
        ));

        Self {
            pool,
            cache,
            config: Arc::new(config),
            jwt_manager,
            storage,
            ocr,
            receipt_parser: Arc::new(ReceiptParser::new()),
            telegram,
            notifier,
            dispatcher,
        }
    }

    /// 对外可访问的绝对地址
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.server.public_base_url.trim_end_matches('/'),
            path
        )
    }
}
