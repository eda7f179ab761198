//! Telegram Bot API 更新模型（仅包含用到的字段）

use serde::{Deserialize, Serialize};

/// webhook 推送的更新
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// 提取需要处理的 (chat_id, 文本)
    ///
    /// 回调按钮的 data 按 deep-link payload 处理，等价于 `/start <data>`
    pub fn actionable_text(&self) -> Option<(i64, String)> {
        if let Some(message) = &self.message {
            let text = message.text.as_deref()?.trim();
            if text.is_empty() {
                return None;
            }
            return Some((message.chat.id, text.to_string()));
        }

        let callback = self.callback_query.as_ref()?;
        let data = callback.data.as_deref()?.trim();
        if data.is_empty() {
            return None;
        }
        let chat_id = callback
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(callback.from.id);
        Some((chat_id, format!("/start {}", data)))
    }

    pub fn sender(&self) -> Option<&User> {
        self.message
            .as_ref()
            .and_then(|m| m.from.as_ref())
            .or_else(|| self.callback_query.as_ref().map(|c| &c.from))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Bot API 通用响应包裹
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i32>,
}

/// sendMessage 返回的消息（只关心 message_id）
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_message() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "chat": { "id": 42, "type": "private" },
                "from": { "id": 42, "is_bot": false, "first_name": "Abebe" },
                "text": " /books "
            }
        }))
        .unwrap();

        assert_eq!(update.actionable_text(), Some((42, "/books".to_string())));
        assert_eq!(update.sender().unwrap().first_name, "Abebe");
    }

    #[test]
    fn test_non_text_updates_are_ignored() {
        let photo_only: Update = serde_json::from_value(json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "chat": { "id": 42, "type": "private" },
                "photo": []
            }
        }))
        .unwrap();
        assert!(photo_only.actionable_text().is_none());

        let channel_post: Update = serde_json::from_value(json!({
            "update_id": 12,
            "channel_post": { "message_id": 3 }
        }))
        .unwrap();
        assert!(channel_post.actionable_text().is_none());
    }

    #[test]
    fn test_callback_data_becomes_start_payload() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 13,
            "callback_query": {
                "id": "cb1",
                "from": { "id": 7, "first_name": "Sara" },
                "message": {
                    "message_id": 5,
                    "chat": { "id": 99, "type": "private" }
                },
                "data": "buy_book_0b7e7d2c-4c0e-4f5e-9a55-6f1b0c1d2e3f"
            }
        }))
        .unwrap();

        let (chat_id, text) = update.actionable_text().unwrap();
        assert_eq!(chat_id, 99);
        assert_eq!(text, "/start buy_book_0b7e7d2c-4c0e-4f5e-9a55-6f1b0c1d2e3f");
    }

    #[test]
    fn test_api_envelope_success() {
        let envelope: ApiEnvelope<SentMessage> = serde_json::from_value(json!({
            "ok": true,
            "result": { "message_id": 77, "chat": { "id": 42, "type": "private" } }
        }))
        .unwrap();
        assert!(envelope.ok);
        assert_eq!(envelope.result.unwrap().message_id, 77);
        assert!(envelope.description.is_none());
    }

    #[test]
    fn test_api_envelope_error() {
        let envelope: ApiEnvelope<SentMessage> = serde_json::from_value(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        }))
        .unwrap();
        assert!(!envelope.ok);
        assert!(envelope.result.is_none());
        assert_eq!(envelope.error_code, Some(403));
    }
}
