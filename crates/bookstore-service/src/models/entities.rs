//! 数据库实体
//!
//! 与 migrations 中的表一一对应，仅用于 sqlx 查询映射，对外响应走 dto

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::enums::{ItemType, PurchaseStatus, RequestSource, UserRole};

/// 用户档案
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub telegram_chat_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 图书
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    /// 图书文件在对象存储中的 key
    pub file_key: String,
    pub price_cents: i64,
    pub currency: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 套装
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Bundle {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 购买申请
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchaseRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    /// 下单时的价格快照
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: PurchaseStatus,
    pub source: RequestSource,
    pub telegram_chat_id: Option<i64>,
    pub screenshot_key: Option<String>,
    pub transaction_reference: Option<String>,
    pub claimed_amount_cents: Option<i64>,
    pub ocr_text: Option<String>,
    pub ocr_amount_cents: Option<i64>,
    pub ocr_reference: Option<String>,
    pub payment_submitted_at: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 已成交订单（每个通过的申请对应一条）
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub request_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// 人工收款方式
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentMethodConfig {
    pub id: i64,
    pub method_code: String,
    pub display_name: String,
    pub account_name: String,
    pub account_number: String,
    pub instructions: Option<String>,
    pub enabled: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 加密货币收款钱包
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WalletConfig {
    pub id: i64,
    pub network: String,
    pub address: String,
    pub label: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth_key: String,
    pub created_at: DateTime<Utc>,
}
