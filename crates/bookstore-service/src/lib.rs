//! 数字书店后端服务
//!
//! 电子书与套装的目录、人工核验付款的购买流程、书架与阅读令牌，
//! 以及 Telegram 机器人下单入口。
//!
//! ## 核心功能
//!
//! - **目录**：图书与套装的公开浏览（Redis 缓存）和后台维护
//! - **购买流程**：申请 → 联系 → 提交付款截图 → 审核通过/拒绝 → 完结
//! - **书架**：审核通过后发放图书，凭短期阅读令牌读取文件
//! - **Telegram**：webhook 命令分发、账号绑定、管理员通知
//! - **后台**：统计看板、用户角色、审计日志、收款配置
//!
//! ## 模块结构
//!
//! - `auth`: JWT 与密码哈希
//! - `dto` / `models`: 请求响应对象与数据库实体
//! - `handlers` / `routes` / `middleware`: HTTP 层
//! - `service`: 需要事务或跨表一致性的业务逻辑
//! - `storage` / `ocr` / `telegram` / `notification`: 外部依赖适配
//! - `worker`: 后台定时任务

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod ocr;
pub mod routes;
pub mod service;
pub mod state;
pub mod storage;
pub mod telegram;
pub mod worker;

pub use error::{ApiError, Result};
pub use routes::build_router;
pub use state::AppState;
