//! 网站账号与 Telegram 会话绑定
//!
//! 用户在网站生成一次性绑定码，再通过 `/start link_<code>` 或 `/link <code>` 完成绑定。

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// 去掉易混淆字符（0/O、1/I）
const LINK_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const LINK_CODE_LEN: usize = 8;

pub fn generate_link_code() -> String {
    let mut rng = rand::rng();
    (0..LINK_CODE_LEN)
        .map(|_| LINK_CODE_ALPHABET[rng.random_range(0..LINK_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn deep_link(bot_username: &str, code: &str) -> String {
    format!("https://t.me/{}?start=link_{}", bot_username.trim_start_matches('@'), code)
}

/// 为用户签发新的绑定码，覆盖旧码
pub async fn issue_link_code(
    pool: &PgPool,
    user_id: Uuid,
    ttl_minutes: i64,
) -> Result<(String, DateTime<Utc>)> {
    let code = generate_link_code();
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

    sqlx::query(
        r#"
        UPDATE profiles
        SET telegram_link_code = $2, telegram_link_expires_at = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(&code)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok((code, expires_at))
}

/// 已绑定的用户
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkedProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

impl LinkedProfile {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

pub async fn find_by_chat(pool: &PgPool, chat_id: i64) -> Result<Option<LinkedProfile>> {
    let profile = sqlx::query_as::<_, LinkedProfile>(
        "SELECT id, email, display_name FROM profiles WHERE telegram_chat_id = $1",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

/// 用绑定码完成绑定；码不存在或已过期返回 `None`
///
/// 同一会话之前绑定的其他账号会被解绑。
pub async fn redeem_link_code(pool: &PgPool, code: &str, chat_id: i64) -> Result<Option<LinkedProfile>> {
    let mut tx = pool.begin().await?;

    let target: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM profiles
        WHERE telegram_link_code = $1 AND telegram_link_expires_at > NOW()
        FOR UPDATE
        "#,
    )
    .bind(code)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(user_id) = target else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(
        "UPDATE profiles SET telegram_chat_id = NULL, updated_at = NOW() WHERE telegram_chat_id = $1 AND id <> $2",
    )
    .bind(chat_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let profile = sqlx::query_as::<_, LinkedProfile>(
        r#"
        UPDATE profiles
        SET telegram_chat_id = $2, telegram_link_code = NULL,
            telegram_link_expires_at = NULL, updated_at = NOW()
        WHERE id = $1
        RETURNING id, email, display_name
        "#,
    )
    .bind(user_id)
    .bind(chat_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(profile))
}
