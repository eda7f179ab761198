//! 用户通知
//!
//! 购买申请状态变化时通过 Telegram、邮件、Web Push 通知用户，
//! 收到付款凭证时通知管理员会话。通知失败只记录日志，不影响业务结果。

mod sender;
mod service;
mod template;
mod types;

pub use sender::{EmailSender, NotificationError, NotificationSender, TelegramSender, WebPushSender};
pub use service::NotificationService;
pub use template::TemplateEngine;
pub use types::{ChannelType, Notification, NotificationKind, NotificationResult, Recipient, SendResult};

#[cfg(test)]
pub use sender::MockNotificationSender;
