//! Telegram Bot API 客户端

use std::time::Duration;

use async_trait::async_trait;
use bookstore_shared::config::TelegramConfig;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::types::{ApiEnvelope, SentMessage};

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Telegram 未配置 bot token")]
    Disabled,
    #[error("Telegram 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API 错误 ({code:?}): {description}")]
    Api {
        code: Option<i32>,
        description: String,
    },
}

/// Bot API 抽象，便于在测试中替换
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// 发送纯文本消息，返回 message_id
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, TelegramError>;

    /// 注册 webhook 地址
    async fn set_webhook(&self, url: &str, secret: Option<String>) -> Result<(), TelegramError>;
}

/// 基于 reqwest 的 Bot API 客户端
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// 根据配置创建；未配置 token 时返回 `None`
    pub fn from_config(config: &TelegramConfig) -> Result<Option<Self>, TelegramError> {
        match config.bot_token.as_deref() {
            Some(token) if !token.is_empty() => {
                Self::new(config.api_base_url.clone(), token).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await?;

        let envelope: ApiEnvelope<T> = response.json().await?;
        match envelope {
            ApiEnvelope {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            other => {
                let description = other
                    .description
                    .unwrap_or_else(|| "empty result".to_string());
                warn!(method, code = ?other.error_code, %description, "Telegram API call rejected");
                Err(TelegramError::Api {
                    code: other.error_code,
                    description,
                })
            }
        }
    }
}

#[async_trait]
impl TelegramApi for TelegramClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, TelegramError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": text,
                    "disable_web_page_preview": true
                }),
            )
            .await?;

        debug!(chat_id, message_id = sent.message_id, "Telegram message sent");
        Ok(sent.message_id)
    }

    #[instrument(skip(self, secret))]
    async fn set_webhook(&self, url: &str, secret: Option<String>) -> Result<(), TelegramError> {
        let mut payload = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"]
        });
        if let Some(secret) = secret {
            payload["secret_token"] = json!(secret);
        }

        let _: bool = self.call("setWebhook", payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url_trims_trailing_slash() {
        let client = TelegramClient::new("http://localhost:9999/", "123:abc").unwrap();
        assert_eq!(
            client.method_url("sendMessage"),
            "http://localhost:9999/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = TelegramConfig::default();
        assert!(TelegramClient::from_config(&config).unwrap().is_none());

        let config = TelegramConfig {
            bot_token: Some("123:abc".into()),
            ..Default::default()
        };
        assert!(TelegramClient::from_config(&config).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_api_surfaces_http_error() {
        let client = TelegramClient::new("http://127.0.0.1:1", "123:abc").unwrap();
        let result = client.send_message(1, "hello").await;
        assert!(matches!(result, Err(TelegramError::Http(_))));
    }
}
