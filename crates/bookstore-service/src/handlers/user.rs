//! 后台用户管理

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use tracing::info;
use uuid::Uuid;

use super::auth::PROFILE_COLUMNS;
use crate::auth::Claims;
use crate::dto::{ApiResponse, PageResponse, PaginationParams, ProfileDto, UpdateUserRoleRequest};
use crate::error::{ApiError, Result};
use crate::models::{Profile, UserRole};
use crate::state::AppState;

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<ProfileDto>>>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "SELECT {} FROM profiles ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        PROFILE_COLUMNS
    );
    let users = sqlx::query_as::<_, Profile>(&sql)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(ApiResponse::success(PageResponse::new(
        users.into_iter().map(ProfileDto::from).collect(),
        total,
        params.page(),
        params.limit(),
    ))))
}

/// 修改用户角色；管理员不能降级自己
///
/// PATCH /api/admin/users/{id}/role
pub async fn update_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRoleRequest>,
) -> Result<Json<ApiResponse<ProfileDto>>> {
    if id == claims.user_id()? && req.role != UserRole::Admin {
        return Err(ApiError::Conflict("不能取消自己的管理员权限".to_string()));
    }

    let sql = format!(
        "UPDATE profiles SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        PROFILE_COLUMNS
    );
    let profile = sqlx::query_as::<_, Profile>(&sql)
        .bind(id)
        .bind(req.role)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("用户 {}", id)))?;

    info!(user_id = %id, role = ?req.role, operator = %claims.sub, "User role updated");
    Ok(Json(ApiResponse::success(profile.into())))
}
