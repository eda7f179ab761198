//! 阅读令牌
//!
//! 令牌原文只在签发时返回一次，库中仅保存 SHA-256 摘要。

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bookstore_shared::observability::metrics;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// 令牌解析结果
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResolvedToken {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub file_key: String,
    pub expires_at: DateTime<Utc>,
}

/// 32 字节随机数，base64url 编码（无填充）
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub async fn issue(pool: &PgPool, user_id: Uuid, book_id: Uuid, ttl_secs: i64) -> Result<IssuedToken> {
    let token = generate_token();
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);

    sqlx::query(
        r#"
        INSERT INTO reading_tokens (token_hash, user_id, book_id, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(hash_token(&token))
    .bind(user_id)
    .bind(book_id)
    .bind(expires_at)
    .execute(pool)
    .await?;

    metrics::record_reading_token_issued();
    debug!(user_id = %user_id, book_id = %book_id, "Reading token issued");

    Ok(IssuedToken { token, expires_at })
}

/// 解析令牌：不存在返回 404，过期返回 410；成功时记录使用时间
pub async fn resolve(pool: &PgPool, token: &str) -> Result<ResolvedToken> {
    let hash = hash_token(token);

    let resolved = sqlx::query_as::<_, ResolvedToken>(
        r#"
        SELECT rt.user_id, rt.book_id, b.file_key, rt.expires_at
        FROM reading_tokens rt
        JOIN books b ON b.id = rt.book_id
        WHERE rt.token_hash = $1
        "#,
    )
    .bind(&hash)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("阅读链接".to_string()))?;

    if resolved.expires_at <= Utc::now() {
        return Err(ApiError::TokenExpired);
    }

    sqlx::query("UPDATE reading_tokens SET last_used_at = NOW() WHERE token_hash = $1")
        .bind(&hash)
        .execute(pool)
        .await?;

    Ok(resolved)
}

/// 删除过期超过 `grace` 的令牌
pub async fn delete_expired(pool: &PgPool, grace: Duration) -> std::result::Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reading_tokens WHERE expires_at < $1")
        .bind(Utc::now() - grace)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();
        // 32 字节 base64 无填充为 43 个字符
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let hash = hash_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash.len(), 64);
        assert_ne!(hash_token("abd"), hash);
    }
}
