//! 请求 DTO 定义
//!
//! 所有 REST API 的请求参数和请求体结构，JSON 字段统一使用 camelCase

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{ItemType, PurchaseStatus, UserRole};

// ==================== 认证 ====================

/// 注册请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "密码长度必须在8-128个字符之间"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "昵称长度必须在1-100个字符之间"))]
    pub display_name: Option<String>,
}

/// 登录请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: String,
    #[validate(length(min = 1, message = "密码不能为空"))]
    pub password: String,
}

// ==================== 目录 ====================

/// 图书列表查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookListQuery {
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl BookListQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// 去掉首尾空白后为空的搜索词视为未搜索
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// ILIKE 子串模式，通配符按字面量匹配（转义符为 `\`）
    pub fn search_pattern(&self) -> Option<String> {
        self.search_term().map(|term| {
            let mut pattern = String::with_capacity(term.len() + 2);
            pattern.push('%');
            for c in term.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    pattern.push('\\');
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }
}

/// 创建图书请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    #[validate(length(min = 1, max = 255, message = "书名长度必须在1-255个字符之间"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "作者长度必须在1-255个字符之间"))]
    pub author: String,
    pub description: Option<String>,
    #[validate(url(message = "封面地址必须是合法 URL"))]
    pub cover_url: Option<String>,
    #[validate(length(min = 1, max = 500, message = "文件 key 不能为空"))]
    pub file_key: String,
    #[validate(range(min = 0, message = "价格不能为负数"))]
    pub price_cents: i64,
    #[validate(length(min = 3, max = 8, message = "币种长度必须在3-8个字符之间"))]
    pub currency: Option<String>,
    pub published: Option<bool>,
}

/// 更新图书请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    #[validate(length(min = 1, max = 255, message = "书名长度必须在1-255个字符之间"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "作者长度必须在1-255个字符之间"))]
    pub author: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "封面地址必须是合法 URL"))]
    pub cover_url: Option<String>,
    #[validate(length(min = 1, max = 500, message = "文件 key 不能为空"))]
    pub file_key: Option<String>,
    #[validate(range(min = 0, message = "价格不能为负数"))]
    pub price_cents: Option<i64>,
    #[validate(length(min = 3, max = 8, message = "币种长度必须在3-8个字符之间"))]
    pub currency: Option<String>,
    pub published: Option<bool>,
}

/// 创建套装请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBundleRequest {
    #[validate(length(min = 1, max = 255, message = "套装名称长度必须在1-255个字符之间"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(url(message = "封面地址必须是合法 URL"))]
    pub cover_url: Option<String>,
    #[validate(range(min = 0, message = "价格不能为负数"))]
    pub price_cents: i64,
    #[validate(length(min = 3, max = 8, message = "币种长度必须在3-8个字符之间"))]
    pub currency: Option<String>,
    pub published: Option<bool>,
    #[validate(length(min = 1, message = "套装至少包含一本书"))]
    pub book_ids: Vec<Uuid>,
}

/// 更新套装请求（不含成员，成员走单独接口）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBundleRequest {
    #[validate(length(min = 1, max = 255, message = "套装名称长度必须在1-255个字符之间"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "封面地址必须是合法 URL"))]
    pub cover_url: Option<String>,
    #[validate(range(min = 0, message = "价格不能为负数"))]
    pub price_cents: Option<i64>,
    #[validate(length(min = 3, max = 8, message = "币种长度必须在3-8个字符之间"))]
    pub currency: Option<String>,
    pub published: Option<bool>,
}

/// 替换套装成员请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetBundleBooksRequest {
    #[validate(length(min = 1, message = "套装至少包含一本书"))]
    pub book_ids: Vec<Uuid>,
}

// ==================== 购买申请 ====================

/// 创建购买申请
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseRequest {
    pub item_type: ItemType,
    pub item_id: Uuid,
    #[validate(length(min = 1, max = 50, message = "支付方式不能为空"))]
    pub payment_method: String,
}

/// 后台申请列表过滤
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequestFilter {
    pub status: Option<PurchaseStatus>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl PurchaseRequestFilter {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// 后台推进申请状态（contacted / awaiting_payment）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestStatusRequest {
    pub status: PurchaseStatus,
    #[validate(length(max = 1000, message = "备注不超过1000字符"))]
    pub note: Option<String>,
}

/// 审核通过
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePurchaseRequest {
    pub request_id: Uuid,
    #[validate(length(max = 1000, message = "备注不超过1000字符"))]
    pub note: Option<String>,
}

/// 审核拒绝
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectPurchaseRequest {
    pub request_id: Uuid,
    #[validate(length(min = 1, max = 500, message = "拒绝原因不能为空且不超过500字符"))]
    pub reason: String,
}

// ==================== 收款配置 ====================

/// 收款方式（创建与整体更新共用）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodRequest {
    #[validate(length(min = 1, max = 50, message = "方式编码长度必须在1-50个字符之间"))]
    pub method_code: String,
    #[validate(length(min = 1, max = 100, message = "显示名称长度必须在1-100个字符之间"))]
    pub display_name: String,
    #[validate(length(min = 1, max = 100, message = "收款户名长度必须在1-100个字符之间"))]
    pub account_name: String,
    #[validate(length(min = 1, max = 100, message = "收款账号长度必须在1-100个字符之间"))]
    pub account_number: String,
    pub instructions: Option<String>,
    pub enabled: Option<bool>,
    pub sort_order: Option<i32>,
}

/// 钱包地址（创建与整体更新共用）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WalletRequest {
    #[validate(length(min = 1, max = 50, message = "网络名称长度必须在1-50个字符之间"))]
    pub network: String,
    #[validate(length(min = 1, max = 255, message = "钱包地址长度必须在1-255个字符之间"))]
    pub address: String,
    #[validate(length(max = 100, message = "标签不超过100字符"))]
    pub label: Option<String>,
    pub enabled: Option<bool>,
}

// ==================== 推送订阅 ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PushKeys {
    #[validate(length(min = 1, message = "p256dh 不能为空"))]
    pub p256dh: String,
    #[validate(length(min = 1, message = "auth 不能为空"))]
    pub auth: String,
}

/// 浏览器 PushSubscription.toJSON() 的结构
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscribeRequest {
    #[validate(url(message = "endpoint 必须是合法 URL"))]
    pub endpoint: String,
    #[validate(nested)]
    pub keys: PushKeys,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PushUnsubscribeRequest {
    #[validate(length(min = 1, message = "endpoint 不能为空"))]
    pub endpoint: String,
}

// ==================== 后台管理 ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetWebhookRequest {
    #[validate(url(message = "webhook 地址必须是合法 URL"))]
    pub url: String,
}

// ==================== 分页 ====================

/// 分页查询参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

/// 页码上限
const MAX_PAGE: i64 = 100_000;

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationParams {
    /// 页码从 1 开始，非法页码按第一页处理，超出上限按最后一页处理
    pub fn page(&self) -> i64 {
        self.page.clamp(1, MAX_PAGE)
    }

    /// 计算数据库查询的 offset
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// 获取限制条数（最大100）
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let params = PaginationParams {
            page: 3,
            page_size: 20,
        };
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);

        let params = PaginationParams {
            page: 0,
            page_size: 500,
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), 100);
    }

    #[test]
    fn test_pagination_defaults() {
        let params: PaginationParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 20);
    }

    #[test]
    fn test_book_query_search_term() {
        let query = BookListQuery {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert!(query.search_term().is_none());

        let query = BookListQuery {
            search: Some(" dune ".into()),
            ..Default::default()
        };
        assert_eq!(query.search_term(), Some("dune"));
        assert_eq!(query.search_pattern().as_deref(), Some("%dune%"));
    }

    #[test]
    fn test_book_query_search_escapes_wildcards() {
        let query = BookListQuery {
            search: Some("100%_off\\".into()),
            ..Default::default()
        };
        assert_eq!(
            query.search_pattern().as_deref(),
            Some("%100\\%\\_off\\\\%")
        );
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let query: BookListQuery =
            serde_json::from_str(r#"{"page":9223372036854775807,"pageSize":100}"#).unwrap();
        let params = query.pagination();
        assert_eq!(params.page(), MAX_PAGE);
        assert_eq!(params.offset(), (MAX_PAGE - 1) * 100);

        let params = PaginationParams {
            page: i64::MIN,
            page_size: i64::MAX,
        };
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), 100);
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest {
            email: "reader@example.com".into(),
            password: "longenough".into(),
            display_name: None,
        };
        assert!(ok.validate().is_ok());

        let short = RegisterRequest {
            email: "reader@example.com".into(),
            password: "short".into(),
            display_name: None,
        };
        assert!(short.validate().is_err());

        let bad_email = RegisterRequest {
            email: "not-an-email".into(),
            password: "longenough".into(),
            display_name: None,
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let request: CreateBookRequest = serde_json::from_value(serde_json::json!({
            "title": "Dune",
            "author": "Frank Herbert",
            "fileKey": "books/dune.pdf",
            "priceCents": -1
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_bundle_requires_books() {
        let request: CreateBundleRequest = serde_json::from_value(serde_json::json!({
            "title": "Empty",
            "priceCents": 100,
            "bookIds": []
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_purchase_request_deserializes() {
        let id = Uuid::new_v4();
        let request: CreatePurchaseRequest = serde_json::from_value(serde_json::json!({
            "itemType": "bundle",
            "itemId": id,
            "paymentMethod": "telebirr"
        }))
        .unwrap();
        assert_eq!(request.item_type, ItemType::Bundle);
        assert_eq!(request.item_id, id);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_push_subscribe_nested_validation() {
        let request: PushSubscribeRequest = serde_json::from_value(serde_json::json!({
            "endpoint": "https://push.example.com/abc",
            "keys": { "p256dh": "", "auth": "secret" }
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_reject_requires_reason() {
        let request = RejectPurchaseRequest {
            request_id: Uuid::new_v4(),
            reason: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
