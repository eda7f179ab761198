//! 响应 DTO 定义
//!
//! 所有 REST API 的响应体结构

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AuditLog, Book, Bundle, ItemType, PaymentMethodConfig, Profile, PurchaseRequest,
    PurchaseStatus, RequestSource, UserRole, WalletConfig,
};
use crate::ocr::OcrSummary;

/// 分页响应
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（自定义消息）
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn success_empty() -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: None,
        }
    }
}

// ==================== 认证 ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub telegram_linked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileDto {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            display_name: p.display_name,
            role: p.role,
            telegram_linked: p.telegram_chat_id.is_some(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    /// Token 过期时间戳（秒）
    pub expires_at: i64,
    pub user: ProfileDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: i64,
}

// ==================== 目录 ====================

/// 图书响应；`file_key` 仅在后台接口中返回
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDto {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookDto {
    pub fn public(book: Book) -> Self {
        Self::build(book, false)
    }

    pub fn admin(book: Book) -> Self {
        Self::build(book, true)
    }

    fn build(book: Book, include_file: bool) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            description: book.description,
            cover_url: book.cover_url,
            price_cents: book.price_cents,
            currency: book.currency,
            published: book.published,
            file_key: include_file.then_some(book.file_key),
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// 套装响应，附带成员图书与相对单买的优惠金额
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDto {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub published: bool,
    pub books: Vec<BookDto>,
    /// 成员图书单买总价
    pub books_total_cents: i64,
    /// 单买总价减去套装价，不会为负
    pub savings_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BundleDto {
    pub fn new(bundle: Bundle, books: Vec<BookDto>) -> Self {
        let books_total_cents: i64 = books.iter().map(|b| b.price_cents).sum();
        Self {
            id: bundle.id,
            title: bundle.title,
            description: bundle.description,
            cover_url: bundle.cover_url,
            price_cents: bundle.price_cents,
            currency: bundle.currency,
            published: bundle.published,
            savings_cents: bundle_savings(books_total_cents, bundle.price_cents),
            books_total_cents,
            books,
            created_at: bundle.created_at,
            updated_at: bundle.updated_at,
        }
    }
}

pub fn bundle_savings(books_total_cents: i64, bundle_price_cents: i64) -> i64 {
    (books_total_cents - bundle_price_cents).max(0)
}

// ==================== 书架 ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItemDto {
    pub book: BookDto,
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAccessDto {
    pub book_id: Uuid,
    pub has_access: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingTokenDto {
    pub token: String,
    pub read_url: String,
    pub expires_at: DateTime<Utc>,
}

// ==================== 购买申请 ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequestDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: PurchaseStatus,
    pub source: RequestSource,
    pub has_screenshot: bool,
    pub transaction_reference: Option<String>,
    pub claimed_amount_cents: Option<i64>,
    pub ocr_amount_cents: Option<i64>,
    pub ocr_reference: Option<String>,
    pub payment_submitted_at: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PurchaseRequest> for PurchaseRequestDto {
    fn from(r: PurchaseRequest) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            item_type: r.item_type,
            item_id: r.item_id,
            amount_cents: r.amount_cents,
            currency: r.currency,
            payment_method: r.payment_method,
            status: r.status,
            source: r.source,
            has_screenshot: r.screenshot_key.is_some(),
            transaction_reference: r.transaction_reference,
            claimed_amount_cents: r.claimed_amount_cents,
            ocr_amount_cents: r.ocr_amount_cents,
            ocr_reference: r.ocr_reference,
            payment_submitted_at: r.payment_submitted_at,
            admin_note: r.admin_note,
            rejection_reason: r.rejection_reason,
            reviewed_at: r.reviewed_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// 付款凭证提交结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmissionDto {
    pub request_id: Uuid,
    pub status: PurchaseStatus,
    pub receipt_url: String,
    pub screenshot_url: String,
    /// 未配置 OCR 或识别失败时为空
    pub ocr: Option<OcrSummary>,
}

/// 审核通过结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDto {
    pub request_id: Uuid,
    pub purchase_id: Uuid,
    pub status: PurchaseStatus,
    /// 本次新加入书架的图书数量（已拥有的不重复计算）
    pub granted_books: u64,
}

/// 公开收据，不含联系方式等隐私信息
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDto {
    pub request_id: Uuid,
    pub item_type: ItemType,
    pub item_title: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: PurchaseStatus,
    pub customer_name: Option<String>,
    pub transaction_reference: Option<String>,
    pub payment_submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ==================== 收款配置 ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodDto {
    pub id: i64,
    pub method_code: String,
    pub display_name: String,
    pub account_name: String,
    pub account_number: String,
    pub instructions: Option<String>,
    pub enabled: bool,
    pub sort_order: i32,
}

impl From<PaymentMethodConfig> for PaymentMethodDto {
    fn from(c: PaymentMethodConfig) -> Self {
        Self {
            id: c.id,
            method_code: c.method_code,
            display_name: c.display_name,
            account_name: c.account_name,
            account_number: c.account_number,
            instructions: c.instructions,
            enabled: c.enabled,
            sort_order: c.sort_order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDto {
    pub id: i64,
    pub network: String,
    pub address: String,
    pub label: Option<String>,
    pub enabled: bool,
}

impl From<WalletConfig> for WalletDto {
    fn from(w: WalletConfig) -> Self {
        Self {
            id: w.id,
            network: w.network,
            address: w.address,
            label: w.label,
            enabled: w.enabled,
        }
    }
}

/// 结账页使用的公开收款配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPaymentConfigDto {
    pub methods: Vec<PaymentMethodDto>,
    pub wallets: Vec<WalletDto>,
}

// ==================== Telegram ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCodeDto {
    pub code: String,
    pub deep_link: String,
    pub expires_at: DateTime<Utc>,
}

// ==================== 后台统计 ====================

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: PurchaseStatus,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TrendDataPoint {
    pub date: NaiveDate,
    pub purchases: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOverview {
    pub total_users: i64,
    pub total_books: i64,
    pub total_bundles: i64,
    pub requests_by_status: Vec<StatusCount>,
    /// 待审核（已提交凭证）数量
    pub awaiting_review: i64,
    pub revenue_cents: i64,
    pub purchase_trend: Vec<TrendDataPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogDto {
    pub id: i64,
    pub operator_id: Option<Uuid>,
    pub operator_email: Option<String>,
    pub module: String,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLog> for AuditLogDto {
    fn from(log: AuditLog) -> Self {
        Self {
            id: log.id,
            operator_id: log.operator_id,
            operator_email: log.operator_email,
            module: log.module,
            action: log.action,
            target_type: log.target_type,
            target_id: log.target_id,
            ip_address: log.ip_address,
            created_at: log.created_at,
        }
    }
}

/// 删除成功响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResponse {
    pub deleted: bool,
}

impl DeletedResponse {
    pub fn success() -> Self {
        Self { deleted: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book(price_cents: i64) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: "Fikir Eske Mekabir".into(),
            author: "Haddis Alemayehu".into(),
            description: None,
            cover_url: None,
            file_key: "books/fikir.pdf".into(),
            price_cents,
            currency: "ETB".into(),
            published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_page_response_total_pages_calculation() {
        let response = PageResponse::<i32>::new(vec![], 100, 1, 10);
        assert_eq!(response.total_pages, 10);

        let response = PageResponse::<i32>::new(vec![], 101, 1, 10);
        assert_eq!(response.total_pages, 11);

        let response = PageResponse::<i32>::new(vec![], 0, 1, 0);
        assert_eq!(response.total_pages, 0);
    }

    #[test]
    fn test_api_response_serialization() {
        let json = serde_json::to_value(ApiResponse::success(DeletedResponse::success())).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["code"], "SUCCESS");
        assert_eq!(json["data"]["deleted"], true);

        let json = serde_json::to_value(ApiResponse::<()>::success_empty()).unwrap();
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_public_book_hides_file_key() {
        let json = serde_json::to_value(BookDto::public(sample_book(100))).unwrap();
        assert!(json.get("fileKey").is_none());
        assert_eq!(json["priceCents"], 100);

        let json = serde_json::to_value(BookDto::admin(sample_book(100))).unwrap();
        assert_eq!(json["fileKey"], "books/fikir.pdf");
    }

    #[test]
    fn test_bundle_savings() {
        let bundle = Bundle {
            id: Uuid::new_v4(),
            title: "Classics".into(),
            description: None,
            cover_url: None,
            price_cents: 50_000,
            currency: "ETB".into(),
            published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let books = vec![
            BookDto::public(sample_book(30_000)),
            BookDto::public(sample_book(35_000)),
        ];

        let dto = BundleDto::new(bundle, books);
        assert_eq!(dto.books_total_cents, 65_000);
        assert_eq!(dto.savings_cents, 15_000);
    }

    #[test]
    fn test_bundle_savings_never_negative() {
        assert_eq!(bundle_savings(1_000, 5_000), 0);
        assert_eq!(bundle_savings(5_000, 1_000), 4_000);
    }

    #[test]
    fn test_profile_dto_reports_telegram_link() {
        let profile = Profile {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            password_hash: "hash".into(),
            display_name: None,
            role: UserRole::User,
            telegram_chat_id: Some(42),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(ProfileDto::from(profile)).unwrap();
        assert_eq!(json["telegramLinked"], true);
        assert!(json.get("passwordHash").is_none());
    }
}
