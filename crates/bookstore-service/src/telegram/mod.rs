//! Telegram 机器人集成
//!
//! - `client`: Bot API 调用（sendMessage / setWebhook）
//! - `types`: webhook 更新模型
//! - `command`: 命令与 deep-link 解析
//! - `dispatcher`: 按命令执行业务并回复
//! - `link`: 网站账号绑定码

pub mod client;
pub mod command;
pub mod dispatcher;
pub mod link;
pub mod types;

pub use client::{TelegramApi, TelegramClient, TelegramError};
pub use command::Command;
pub use dispatcher::TelegramDispatcher;
pub use types::Update;
