//! DTO 模块
//!
//! 包含所有请求和响应的数据传输对象

pub mod request;
pub mod response;

pub use request::{
    ApprovePurchaseRequest, BookListQuery, CreateBookRequest, CreateBundleRequest,
    CreatePurchaseRequest, LoginRequest, PaginationParams, PaymentMethodRequest,
    PurchaseRequestFilter, PushSubscribeRequest, PushUnsubscribeRequest, RegisterRequest,
    RejectPurchaseRequest, SetBundleBooksRequest, SetWebhookRequest, UpdateBookRequest,
    UpdateBundleRequest, UpdateRequestStatusRequest, UpdateUserRoleRequest, WalletRequest,
};
pub use response::{
    ApiResponse, ApprovalDto, AuditLogDto, AuthResponse, BookAccessDto, BookDto, BundleDto,
    DeletedResponse, LibraryItemDto, LinkCodeDto, PageResponse, PaymentMethodDto,
    PaymentSubmissionDto, ProfileDto, PublicPaymentConfigDto, PurchaseRequestDto,
    ReadingTokenDto, ReceiptDto, StatsOverview, StatusCount, TokenResponse, TrendDataPoint,
    WalletDto,
};
