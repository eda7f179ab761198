use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

/// 通知场景
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// 购买申请已创建
    RequestReceived,
    /// 用户提交了付款凭证（发给管理员）
    PaymentSubmitted,
    PurchaseApproved,
    PurchaseRejected,
    PurchaseCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestReceived => "request_received",
            Self::PaymentSubmitted => "payment_submitted",
            Self::PurchaseApproved => "purchase_approved",
            Self::PurchaseRejected => "purchase_rejected",
            Self::PurchaseCompleted => "purchase_completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Telegram,
    Email,
    WebPush,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Email => "email",
            Self::WebPush => "web_push",
        }
    }
}

/// 通知接收方的联系方式
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub push_endpoints: Vec<String>,
}

impl Recipient {
    /// 仅有 Telegram 会话的接收方（管理员群）
    pub fn telegram_chat(chat_id: i64) -> Self {
        Self {
            telegram_chat_id: Some(chat_id),
            ..Default::default()
        }
    }
}

/// 待发送的通知（变量尚未渲染）
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub variables: HashMap<String, String>,
}

impl Notification {
    pub fn new(kind: NotificationKind, recipient: Recipient) -> Self {
        Self {
            kind,
            recipient,
            variables: HashMap::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// 单渠道发送结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub channel: ChannelType,
    pub success: bool,
    pub error: Option<String>,
}

impl SendResult {
    pub fn ok(channel: ChannelType) -> Self {
        Self {
            channel,
            success: true,
            error: None,
        }
    }

    pub fn failed(channel: ChannelType, error: impl Into<String>) -> Self {
        Self {
            channel,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// 一次通知在所有渠道上的汇总结果
#[derive(Debug, Clone)]
pub struct NotificationResult {
    pub kind: NotificationKind,
    pub results: Vec<SendResult>,
}

impl NotificationResult {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// 没有任何渠道可用
    pub fn is_undelivered(&self) -> bool {
        self.success_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_builder() {
        let n = Notification::new(NotificationKind::PurchaseApproved, Recipient::telegram_chat(5))
            .with_var("item_title", "Dune")
            .with_var("request_id", "abc");
        assert_eq!(n.variables.len(), 2);
        assert_eq!(n.recipient.telegram_chat_id, Some(5));
        assert!(n.recipient.email.is_none());
    }

    #[test]
    fn test_result_counts() {
        let result = NotificationResult {
            kind: NotificationKind::PurchaseRejected,
            results: vec![
                SendResult::ok(ChannelType::Telegram),
                SendResult::failed(ChannelType::Email, "smtp down"),
            ],
        };
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failure_count(), 1);
        assert!(!result.is_undelivered());
    }
}
