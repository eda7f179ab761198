use std::sync::Arc;

use bookstore_shared::observability::metrics;
use futures::future::join_all;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::sender::{EmailSender, NotificationSender, TelegramSender, WebPushSender};
use super::template::TemplateEngine;
use super::types::{Notification, NotificationKind, NotificationResult, Recipient, SendResult};
use crate::telegram::TelegramApi;

/// 通知服务
///
/// 渲染模板后并行投递到接收方可用的所有渠道，单渠道失败不影响其他渠道。
pub struct NotificationService {
    senders: Vec<Arc<dyn NotificationSender>>,
    templates: TemplateEngine,
    admin_chat_id: Option<i64>,
}

impl NotificationService {
    pub fn new(templates: TemplateEngine) -> Self {
        Self {
            senders: Vec::new(),
            templates,
            admin_chat_id: None,
        }
    }

    /// 默认渠道：邮件、Web Push，以及配置了 bot 时的 Telegram
    pub fn with_defaults(telegram: Option<Arc<dyn TelegramApi>>, admin_chat_id: Option<i64>) -> Self {
        let mut service = Self::new(TemplateEngine::with_defaults()).with_admin_chat(admin_chat_id);
        if let Some(api) = telegram {
            service.register_sender(Arc::new(TelegramSender::new(api)));
        }
        service.register_sender(Arc::new(EmailSender::default()));
        service.register_sender(Arc::new(WebPushSender));
        service
    }

    pub fn with_admin_chat(mut self, admin_chat_id: Option<i64>) -> Self {
        self.admin_chat_id = admin_chat_id;
        self
    }

    pub fn register_sender(&mut self, sender: Arc<dyn NotificationSender>) {
        info!(channel = sender.channel().as_str(), "注册通知渠道");
        self.senders.push(sender);
    }

    /// 发送通知并汇总各渠道结果
    #[instrument(skip(self, notification), fields(kind = notification.kind.as_str()))]
    pub async fn notify(&self, notification: Notification) -> NotificationResult {
        let kind = notification.kind;
        let Some((title, body)) = self.templates.render_kind(kind, &notification.variables) else {
            warn!("通知模板未注册");
            return NotificationResult {
                kind,
                results: vec![],
            };
        };

        let recipient = &notification.recipient;
        let targets: Vec<_> = self
            .senders
            .iter()
            .filter(|s| s.is_available(recipient))
            .cloned()
            .collect();

        if targets.is_empty() {
            debug!(user_id = ?recipient.user_id, "接收方没有可用的通知渠道");
            return NotificationResult {
                kind,
                results: vec![],
            };
        }

        let sends = targets.iter().map(|sender| {
            let title = title.as_str();
            let body = body.as_str();
            async move {
                let channel = sender.channel();
                match sender.send(recipient, title, body).await {
                    Ok(()) => SendResult::ok(channel),
                    Err(e) => {
                        error!(channel = channel.as_str(), error = %e, "渠道发送失败");
                        SendResult::failed(channel, e.to_string())
                    }
                }
            }
        });

        let results = join_all(sends).await;
        for result in &results {
            metrics::record_notification(result.channel.as_str(), result.success);
        }

        let result = NotificationResult { kind, results };
        info!(
            success_count = result.success_count(),
            failure_count = result.failure_count(),
            "通知发送完成"
        );
        result
    }

    /// 查询用户联系方式后发送
    pub async fn notify_user(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        kind: NotificationKind,
        variables: Vec<(&str, String)>,
    ) -> Result<NotificationResult, sqlx::Error> {
        let recipient = load_recipient(pool, user_id).await?;
        let notification = variables
            .into_iter()
            .fold(Notification::new(kind, recipient), |n, (k, v)| n.with_var(k, v));
        Ok(self.notify(notification).await)
    }

    /// 发送到管理员会话；未配置时跳过
    pub async fn notify_admin(
        &self,
        kind: NotificationKind,
        variables: Vec<(&str, String)>,
    ) -> Option<NotificationResult> {
        let chat_id = self.admin_chat_id?;
        let notification = variables.into_iter().fold(
            Notification::new(kind, Recipient::telegram_chat(chat_id)),
            |n, (k, v)| n.with_var(k, v),
        );
        Some(self.notify(notification).await)
    }

    /// 后台发送用户通知，不阻塞调用方
    pub fn spawn_notify_user(
        self: &Arc<Self>,
        pool: PgPool,
        user_id: Uuid,
        kind: NotificationKind,
        variables: Vec<(&'static str, String)>,
    ) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.notify_user(&pool, user_id, kind, variables).await {
                warn!(user_id = %user_id, kind = kind.as_str(), error = %e, "加载通知接收方失败");
            }
        });
    }

    /// 后台发送管理员通知
    pub fn spawn_notify_admin(
        self: &Arc<Self>,
        kind: NotificationKind,
        variables: Vec<(&'static str, String)>,
    ) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.notify_admin(kind, variables).await;
        });
    }
}

/// 从 profiles 与 push_subscriptions 组装接收方
pub async fn load_recipient(pool: &PgPool, user_id: Uuid) -> Result<Recipient, sqlx::Error> {
    let (email, telegram_chat_id): (String, Option<i64>) =
        sqlx::query_as("SELECT email, telegram_chat_id FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    let push_endpoints: Vec<String> =
        sqlx::query_scalar("SELECT endpoint FROM push_subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(Recipient {
        user_id: Some(user_id),
        email: Some(email),
        telegram_chat_id,
        push_endpoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::sender::{MockNotificationSender, NotificationError};
    use crate::notification::types::ChannelType;

    fn mock_sender(channel: ChannelType, available: bool, fails: bool) -> MockNotificationSender {
        let mut sender = MockNotificationSender::new();
        sender.expect_channel().return_const(channel);
        sender.expect_is_available().return_const(available);
        if available {
            sender.expect_send().times(1).returning(move |_, _, _| {
                if fails {
                    Err(NotificationError::MissingAddress("test"))
                } else {
                    Ok(())
                }
            });
        } else {
            sender.expect_send().never();
        }
        sender
    }

    fn approved(recipient: Recipient) -> Notification {
        Notification::new(NotificationKind::PurchaseApproved, recipient).with_var("item_title", "Dune")
    }

    #[tokio::test]
    async fn test_fan_out_to_available_channels() {
        let mut service = NotificationService::new(TemplateEngine::with_defaults());
        service.register_sender(Arc::new(mock_sender(ChannelType::Telegram, true, false)));
        service.register_sender(Arc::new(mock_sender(ChannelType::Email, true, false)));
        service.register_sender(Arc::new(mock_sender(ChannelType::WebPush, false, false)));

        let result = service.notify(approved(Recipient::telegram_chat(1))).await;
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.success_count(), 2);
    }

    #[tokio::test]
    async fn test_channel_failure_is_isolated() {
        let mut service = NotificationService::new(TemplateEngine::with_defaults());
        service.register_sender(Arc::new(mock_sender(ChannelType::Telegram, true, true)));
        service.register_sender(Arc::new(mock_sender(ChannelType::Email, true, false)));

        let result = service.notify(approved(Recipient::telegram_chat(1))).await;
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failure_count(), 1);
        let failed = result.results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.channel, ChannelType::Telegram);
    }

    #[tokio::test]
    async fn test_no_channels_available() {
        let mut service = NotificationService::new(TemplateEngine::with_defaults());
        service.register_sender(Arc::new(mock_sender(ChannelType::Email, false, false)));

        let result = service.notify(approved(Recipient::default())).await;
        assert!(result.results.is_empty());
        assert!(result.is_undelivered());
    }

    #[tokio::test]
    async fn test_notify_admin_requires_chat() {
        let service = NotificationService::new(TemplateEngine::with_defaults());
        assert!(
            service
                .notify_admin(NotificationKind::PaymentSubmitted, vec![])
                .await
                .is_none()
        );

        let mut service = NotificationService::new(TemplateEngine::with_defaults()).with_admin_chat(Some(-100));
        service.register_sender(Arc::new(mock_sender(ChannelType::Telegram, true, false)));
        let result = service
            .notify_admin(
                NotificationKind::PaymentSubmitted,
                vec![("customer", "Sara".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(result.success_count(), 1);
    }
}
