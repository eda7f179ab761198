//! 书店业务枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化，数据库中以小写字符串存储

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 用户角色
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("未知角色: {}", other)),
        }
    }
}

/// 商品类型
///
/// 购买申请可以针对单本书或套装
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum ItemType {
    Book,
    Bundle,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Bundle => "bundle",
        }
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "book" => Ok(Self::Book),
            "bundle" => Ok(Self::Bundle),
            other => Err(format!("未知商品类型: {}", other)),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 购买申请来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum RequestSource {
    /// 网站下单
    #[default]
    Web,
    /// Telegram 机器人 /buy 命令
    Telegram,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Telegram => "telegram",
        }
    }
}

/// 购买申请状态
///
/// 人工审核付款截图的生命周期：
///
/// ```text
/// pending ──► contacted ──► awaiting_payment ──► approved ──► completed
///    │            │               │
///    └────────────┴───────────────┴──────────► rejected
/// pending ──► awaiting_payment
/// pending / contacted / awaiting_payment ──► expired
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// 已提交，等待管理员联系
    #[default]
    Pending,
    /// 管理员已联系用户
    Contacted,
    /// 等待/已收到付款凭证，待核验
    AwaitingPayment,
    /// 已核验，书籍已入库
    Approved,
    /// 已拒绝（含用户取消）
    Rejected,
    /// 已完结
    Completed,
    /// 长时间未处理自动过期
    Expired,
}

impl PurchaseStatus {
    pub const ALL: [PurchaseStatus; 7] = [
        Self::Pending,
        Self::Contacted,
        Self::AwaitingPayment,
        Self::Approved,
        Self::Rejected,
        Self::Completed,
        Self::Expired,
    ];

    /// 未结状态：仍可被审核、取消或过期
    pub const OPEN: [PurchaseStatus; 3] = [Self::Pending, Self::Contacted, Self::AwaitingPayment];

    /// 状态流转表，所有状态变更都必须经过这里
    pub fn can_transition_to(&self, next: PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, next),
            (Pending, Contacted)
                | (Pending, AwaitingPayment)
                | (Contacted, AwaitingPayment)
                | (AwaitingPayment, Approved)
                | (Approved, Completed)
                | (Pending, Rejected)
                | (Contacted, Rejected)
                | (AwaitingPayment, Rejected)
                | (Pending, Expired)
                | (Contacted, Expired)
                | (AwaitingPayment, Expired)
        )
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    /// 未结状态名，供 SQL `status = ANY($n)` 绑定
    pub fn open_names() -> Vec<&'static str> {
        Self::OPEN.iter().map(Self::as_str).collect()
    }

    /// 允许流转到 `next` 的状态名
    pub fn names_transitioning_to(next: PurchaseStatus) -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|status| status.can_transition_to(next))
            .map(Self::as_str)
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        Self::ALL.iter().all(|next| !self.can_transition_to(*next))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Contacted => "contacted",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    /// 面向用户的展示文案（Telegram 回复、通知）
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending review",
            Self::Contacted => "Contacted",
            Self::AwaitingPayment => "Payment under review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Completed => "Completed",
            Self::Expired => "Expired",
        }
    }
}

impl FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("未知申请状态: {}", s))
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
