//! 认证相关的 HTTP 处理器
//!
//! 提供注册、登录、登出、获取当前用户和刷新 Token 的 API

use axum::{Extension, Json, extract::State};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{Claims, hash_password, verify_password};
use crate::dto::{ApiResponse, AuthResponse, LoginRequest, ProfileDto, RegisterRequest, TokenResponse};
use crate::error::{ApiError, Result};
use crate::models::{Profile, UserRole};
use crate::state::AppState;

pub(crate) const PROFILE_COLUMNS: &str =
    "id, email, password_hash, display_name, role, telegram_chat_id, created_at, updated_at";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 用户注册
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    req.validate()?;

    let email = normalize_email(&req.email);
    let password_hash = hash_password(&req.password)?;
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let sql = format!(
        r#"
        INSERT INTO profiles (id, email, password_hash, display_name, role)
        VALUES ($1, $2, $3, $4, 'user')
        RETURNING {}
        "#,
        PROFILE_COLUMNS
    );
    let profile = sqlx::query_as::<_, Profile>(&sql)
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&password_hash)
        .bind(display_name)
        .fetch_one(&state.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::EmailTaken,
            _ => ApiError::Database(e),
        })?;

    info!(user_id = %profile.id, "User registered");

    let (token, expires_at) = state
        .jwt_manager
        .generate_token(profile.id, &profile.email, profile.role)?;

    Ok(Json(ApiResponse::success(AuthResponse {
        token,
        expires_at,
        user: profile.into(),
    })))
}

/// 用户登录
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    req.validate()?;

    let sql = format!("SELECT {} FROM profiles WHERE email = $1", PROFILE_COLUMNS);
    let profile = sqlx::query_as::<_, Profile>(&sql)
        .bind(normalize_email(&req.email))
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &profile.password_hash)? {
        return Err(ApiError::InvalidCredentials);
    }

    let (token, expires_at) = state
        .jwt_manager
        .generate_token(profile.id, &profile.email, profile.role)?;

    info!(user_id = %profile.id, role = profile.role.as_str(), "User logged in");

    Ok(Json(ApiResponse::success(AuthResponse {
        token,
        expires_at,
        user: profile.into(),
    })))
}

/// 用户登出
///
/// POST /api/auth/logout
pub async fn logout() -> Json<ApiResponse<()>> {
    // JWT 无状态，前端清除 Token 即可
    Json(ApiResponse::success_empty())
}

/// 获取当前用户信息
///
/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<ProfileDto>>> {
    let user_id = claims.user_id()?;
    let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
    let profile = sqlx::query_as::<_, Profile>(&sql)
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("用户不存在".to_string()))?;

    Ok(Json(ApiResponse::success(profile.into())))
}

/// 刷新 Token
///
/// POST /api/auth/refresh
///
/// 角色以数据库为准，后台调整角色后刷新即可生效。
pub async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<TokenResponse>>> {
    let user_id = claims.user_id()?;
    let role: UserRole = sqlx::query_scalar("SELECT role FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("用户不存在".to_string()))?;

    let (token, expires_at) = state
        .jwt_manager
        .generate_token(user_id, &claims.email, role)?;

    Ok(Json(ApiResponse::success(TokenResponse { token, expires_at })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Reader@Example.COM "), "reader@example.com");
    }
}
