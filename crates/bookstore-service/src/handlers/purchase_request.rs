//! 购买申请 API 处理器
//!
//! 用户侧：创建、查看、取消申请与查看付款截图；
//! 后台：列表、推进状态、审核通过/拒绝、完结。

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::file_response;
use crate::auth::Claims;
use crate::dto::{
    ApiResponse, ApprovalDto, ApprovePurchaseRequest, CreatePurchaseRequest, PageResponse,
    PurchaseRequestDto, PurchaseRequestFilter, RejectPurchaseRequest, UpdateRequestStatusRequest,
};
use crate::error::{ApiError, Result};
use crate::models::{PurchaseRequest, PurchaseStatus, RequestSource};
use crate::notification::NotificationKind;
use crate::service::purchase_workflow::{self, NewPurchaseRequest};
use crate::service::{catalog, format_money};
use crate::state::AppState;
use crate::storage::content_type_for_key;

const USER_LIST_LIMIT: i64 = 100;
const UNKNOWN_ITEM: &str = "your item";

/// 读取申请并校验可见性：本人或管理员，其他人一律 404
async fn visible_request(state: &AppState, claims: &Claims, id: Uuid) -> Result<PurchaseRequest> {
    let request = purchase_workflow::find_request(&state.pool, id).await?;
    if !claims.is_admin() && request.user_id != claims.user_id()? {
        return Err(ApiError::PurchaseRequestNotFound(id));
    }
    Ok(request)
}

/// 通知里展示的商品名；商品被删除时使用通用名称
pub(crate) async fn item_label(state: &AppState, request: &PurchaseRequest) -> String {
    match catalog::item_title(&state.pool, request.item_type, request.item_id).await {
        Ok(Some(title)) => title,
        Ok(None) => UNKNOWN_ITEM.to_string(),
        Err(e) => {
            warn!(request_id = %request.id, error = %e, "Failed to load item title");
            UNKNOWN_ITEM.to_string()
        }
    }
}

/// 创建购买申请
///
/// POST /api/purchase-requests
pub async fn create_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePurchaseRequest>,
) -> Result<Json<ApiResponse<PurchaseRequestDto>>> {
    req.validate()?;
    let user_id = claims.user_id()?;

    let created = purchase_workflow::create_request(
        &state.pool,
        NewPurchaseRequest {
            user_id,
            item_type: req.item_type,
            item_id: req.item_id,
            payment_method: req.payment_method.trim().to_string(),
            source: RequestSource::Web,
            telegram_chat_id: None,
        },
    )
    .await?;

    let request = created.request;
    state.notifier.spawn_notify_user(
        state.pool.clone(),
        user_id,
        NotificationKind::RequestReceived,
        vec![
            ("item_title", created.item_title),
            ("amount", format_money(request.amount_cents, &request.currency)),
            ("request_id", request.id.to_string()),
        ],
    );

    Ok(Json(ApiResponse::success(request.into())))
}

/// 当前用户的申请，最新的在前
///
/// GET /api/purchase-requests
pub async fn list_my_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<Vec<PurchaseRequestDto>>>> {
    let requests =
        purchase_workflow::list_for_user(&state.pool, claims.user_id()?, USER_LIST_LIMIT).await?;
    Ok(Json(ApiResponse::success(
        requests.into_iter().map(PurchaseRequestDto::from).collect(),
    )))
}

/// GET /api/purchase-requests/{id}
pub async fn get_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PurchaseRequestDto>>> {
    let request = visible_request(&state, &claims, id).await?;
    Ok(Json(ApiResponse::success(request.into())))
}

/// 用户取消待处理的申请
///
/// POST /api/purchase-requests/{id}/cancel
pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PurchaseRequestDto>>> {
    let request = purchase_workflow::cancel_by_user(&state.pool, id, claims.user_id()?).await?;
    Ok(Json(ApiResponse::success(request.into())))
}

/// 付款截图
///
/// GET /api/purchase-requests/{id}/screenshot
pub async fn get_screenshot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let request = visible_request(&state, &claims, id).await?;
    let key = request
        .screenshot_key
        .ok_or_else(|| ApiError::NotFound("付款截图".to_string()))?;

    let bytes = state.storage.get(&key).await?;
    Ok(file_response(bytes, content_type_for_key(&key)))
}

// ==================== 后台 ====================

/// GET /api/admin/purchase-requests
pub async fn admin_list_requests(
    State(state): State<AppState>,
    Query(filter): Query<PurchaseRequestFilter>,
) -> Result<Json<ApiResponse<PageResponse<PurchaseRequestDto>>>> {
    let params = filter.pagination();
    let (items, total) =
        purchase_workflow::list_all(&state.pool, filter.status, params.limit(), params.offset())
            .await?;

    Ok(Json(ApiResponse::success(PageResponse::new(
        items.into_iter().map(PurchaseRequestDto::from).collect(),
        total,
        params.page(),
        params.limit(),
    ))))
}

/// 后台推进申请状态，只允许 contacted / awaiting_payment
///
/// PATCH /api/admin/purchase-requests/{id}/status
pub async fn admin_update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRequestStatusRequest>,
) -> Result<Json<ApiResponse<PurchaseRequestDto>>> {
    req.validate()?;
    if !matches!(
        req.status,
        PurchaseStatus::Contacted | PurchaseStatus::AwaitingPayment
    ) {
        return Err(ApiError::Validation(format!(
            "状态 {} 需通过对应的审核接口变更",
            req.status
        )));
    }

    let request = purchase_workflow::transition(
        &state.pool,
        id,
        req.status,
        req.note.as_deref(),
        Some(claims.user_id()?),
    )
    .await?;

    Ok(Json(ApiResponse::success(request.into())))
}

/// 审核通过并发放图书
///
/// POST /api/admin/approve-purchase
pub async fn approve_purchase(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ApprovePurchaseRequest>,
) -> Result<Json<ApiResponse<ApprovalDto>>> {
    req.validate()?;

    let approval = purchase_workflow::approve(
        &state.pool,
        req.request_id,
        claims.user_id()?,
        req.note.as_deref(),
    )
    .await?;

    let request = &approval.request;
    let title = item_label(&state, request).await;
    state.notifier.spawn_notify_user(
        state.pool.clone(),
        request.user_id,
        NotificationKind::PurchaseApproved,
        vec![("item_title", title)],
    );

    info!(request_id = %request.id, reviewer = %claims.sub, "Purchase approved by admin");

    Ok(Json(ApiResponse::success(ApprovalDto {
        request_id: request.id,
        purchase_id: approval.purchase_id,
        status: request.status,
        granted_books: approval.granted_books,
    })))
}

/// 审核拒绝
///
/// POST /api/admin/reject-purchase
pub async fn reject_purchase(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RejectPurchaseRequest>,
) -> Result<Json<ApiResponse<PurchaseRequestDto>>> {
    req.validate()?;
    let reason = req.reason.trim().to_string();

    let request =
        purchase_workflow::reject(&state.pool, req.request_id, claims.user_id()?, &reason).await?;

    let title = item_label(&state, &request).await;
    state.notifier.spawn_notify_user(
        state.pool.clone(),
        request.user_id,
        NotificationKind::PurchaseRejected,
        vec![("item_title", title), ("reason", reason)],
    );

    Ok(Json(ApiResponse::success(request.into())))
}

/// POST /api/admin/purchase-requests/{id}/complete
pub async fn complete_purchase(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PurchaseRequestDto>>> {
    let request = purchase_workflow::complete(&state.pool, id, claims.user_id()?).await?;

    let title = item_label(&state, &request).await;
    state.notifier.spawn_notify_user(
        state.pool.clone(),
        request.user_id,
        NotificationKind::PurchaseCompleted,
        vec![("item_title", title)],
    );

    Ok(Json(ApiResponse::success(request.into())))
}
