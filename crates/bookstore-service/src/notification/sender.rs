//! 通知渠道
//!
//! Telegram 通过 Bot API 真实投递；邮件与 Web Push 目前为模拟实现，只记录日志。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::types::{ChannelType, Recipient};
use crate::telegram::{TelegramApi, TelegramError};

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Telegram 投递失败: {0}")]
    Telegram(#[from] TelegramError),
    #[error("接收方缺少 {0} 渠道的联系方式")]
    MissingAddress(&'static str),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    fn channel(&self) -> ChannelType;

    /// 接收方是否具备该渠道的联系方式
    fn is_available(&self, recipient: &Recipient) -> bool;

    async fn send(
        &self,
        recipient: &Recipient,
        title: &str,
        body: &str,
    ) -> Result<(), NotificationError>;
}

pub struct TelegramSender {
    api: Arc<dyn TelegramApi>,
}

impl TelegramSender {
    pub fn new(api: Arc<dyn TelegramApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    fn channel(&self) -> ChannelType {
        ChannelType::Telegram
    }

    fn is_available(&self, recipient: &Recipient) -> bool {
        recipient.telegram_chat_id.is_some()
    }

    async fn send(
        &self,
        recipient: &Recipient,
        title: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let chat_id = recipient
            .telegram_chat_id
            .ok_or(NotificationError::MissingAddress("telegram"))?;
        let text = format!("{}\n\n{}", title, body);
        self.api.send_message(chat_id, &text).await?;
        Ok(())
    }
}

/// 邮件渠道（模拟）
pub struct EmailSender {
    from_address: String,
}

impl EmailSender {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

impl Default for EmailSender {
    fn default() -> Self {
        Self::new("noreply@bookstore.local")
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    fn channel(&self) -> ChannelType {
        ChannelType::Email
    }

    fn is_available(&self, recipient: &Recipient) -> bool {
        recipient.email.as_deref().is_some_and(|e| e.contains('@'))
    }

    async fn send(
        &self,
        recipient: &Recipient,
        title: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let to = recipient
            .email
            .as_deref()
            .ok_or(NotificationError::MissingAddress("email"))?;

        info!(
            from = %self.from_address,
            to,
            subject = title,
            body_len = body.len(),
            "模拟发送邮件"
        );
        Ok(())
    }
}

/// Web Push 渠道（模拟），对用户的每个订阅端点各投递一次
#[derive(Default)]
pub struct WebPushSender;

#[async_trait]
impl NotificationSender for WebPushSender {
    fn channel(&self) -> ChannelType {
        ChannelType::WebPush
    }

    fn is_available(&self, recipient: &Recipient) -> bool {
        !recipient.push_endpoints.is_empty()
    }

    async fn send(
        &self,
        recipient: &Recipient,
        title: &str,
        _body: &str,
    ) -> Result<(), NotificationError> {
        if recipient.push_endpoints.is_empty() {
            return Err(NotificationError::MissingAddress("web_push"));
        }

        for endpoint in &recipient.push_endpoints {
            debug!(endpoint, title, "模拟 Web Push 投递");
        }
        info!(
            endpoints = recipient.push_endpoints.len(),
            "Web Push 投递完成"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::client::MockTelegramApi;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_telegram_sender_formats_message() {
        let mut api = MockTelegramApi::new();
        api.expect_send_message()
            .with(eq(42), eq("Title\n\nBody"))
            .times(1)
            .returning(|_, _| Ok(7));

        let sender = TelegramSender::new(Arc::new(api));
        let recipient = Recipient::telegram_chat(42);
        assert!(sender.is_available(&recipient));
        sender.send(&recipient, "Title", "Body").await.unwrap();
    }

    #[tokio::test]
    async fn test_telegram_sender_requires_chat() {
        let sender = TelegramSender::new(Arc::new(MockTelegramApi::new()));
        let recipient = Recipient::default();
        assert!(!sender.is_available(&recipient));
        assert!(matches!(
            sender.send(&recipient, "t", "b").await,
            Err(NotificationError::MissingAddress("telegram"))
        ));
    }

    #[tokio::test]
    async fn test_simulated_channels_availability() {
        let email = EmailSender::default();
        let push = WebPushSender;

        let recipient = Recipient {
            email: Some("reader@example.com".into()),
            push_endpoints: vec!["https://push.example.com/abc".into()],
            ..Default::default()
        };
        assert!(email.is_available(&recipient));
        assert!(push.is_available(&recipient));
        email.send(&recipient, "t", "b").await.unwrap();
        push.send(&recipient, "t", "b").await.unwrap();

        let empty = Recipient::default();
        assert!(!email.is_available(&empty));
        assert!(!push.is_available(&empty));
    }
}
