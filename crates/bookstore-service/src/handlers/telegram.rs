//! Telegram webhook 与账号绑定

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde_json::{Value, json};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{ApiResponse, LinkCodeDto, SetWebhookRequest};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::telegram::{Update, link};

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// 校验 webhook secret；未配置 secret 时不校验
pub(crate) fn verify_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected.filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided == expected {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("webhook secret 不匹配".to_string()))
    }
}

/// Telegram webhook
///
/// POST /api/telegram/webhook
///
/// 无法解析的更新直接确认，避免 Telegram 重复投递。
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    verify_secret(&headers, state.config.telegram.webhook_secret.as_deref())?;

    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => state.dispatcher.handle_update(&update).await,
        Err(e) => warn!(error = %e, size = body.len(), "Unparseable Telegram update ignored"),
    }

    Ok(Json(json!({ "ok": true })))
}

/// 生成 Telegram 绑定码
///
/// POST /api/telegram/link-code
pub async fn link_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<LinkCodeDto>>> {
    let telegram = &state.config.telegram;
    let (code, expires_at) =
        link::issue_link_code(&state.pool, claims.user_id()?, telegram.link_code_ttl_minutes).await?;

    Ok(Json(ApiResponse::success(LinkCodeDto {
        deep_link: link::deep_link(&telegram.bot_username, &code),
        code,
        expires_at,
    })))
}

/// 向 Telegram 注册 webhook 地址
///
/// POST /api/admin/telegram/set-webhook
pub async fn set_webhook(
    State(state): State<AppState>,
    Json(req): Json<SetWebhookRequest>,
) -> Result<Json<ApiResponse<()>>> {
    req.validate()?;
    let api = state
        .telegram
        .as_ref()
        .ok_or_else(|| ApiError::Validation("未配置 Telegram bot token".to_string()))?;

    api.set_webhook(&req.url, state.config.telegram.webhook_secret.clone())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(url = %req.url, "Telegram webhook registered");
    Ok(Json(ApiResponse::success_with_message((), "webhook 已设置")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_secret_not_configured() {
        assert!(verify_secret(&HeaderMap::new(), None).is_ok());
        assert!(verify_secret(&HeaderMap::new(), Some("")).is_ok());
    }

    #[test]
    fn test_secret_mismatch() {
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, HeaderValue::from_static("wrong"));
        assert!(matches!(
            verify_secret(&headers, Some("s3cret")),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(verify_secret(&HeaderMap::new(), Some("s3cret")).is_err());
    }

    #[test]
    fn test_secret_match() {
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, HeaderValue::from_static("s3cret"));
        assert!(verify_secret(&headers, Some("s3cret")).is_ok());
    }
}
