//! 审计日志查询

use axum::{
    Json,
    extract::{Query, State},
};

use crate::dto::{ApiResponse, AuditLogDto, PageResponse, PaginationParams};
use crate::error::Result;
use crate::models::AuditLog;
use crate::state::AppState;

/// GET /api/admin/audit-logs
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<AuditLogDto>>>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_audit_logs")
        .fetch_one(&state.pool)
        .await?;

    let logs = sqlx::query_as::<_, AuditLog>(
        r#"
        SELECT id, operator_id, operator_email, module, action, target_type, target_id,
               ip_address, user_agent, created_at
        FROM admin_audit_logs
        ORDER BY created_at DESC, id DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(PageResponse::new(
        logs.into_iter().map(AuditLogDto::from).collect(),
        total,
        params.page(),
        params.limit(),
    ))))
}
