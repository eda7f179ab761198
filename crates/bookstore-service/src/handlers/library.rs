//! 书架与阅读 API 处理器

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use super::file_response;
use crate::auth::Claims;
use crate::dto::{ApiResponse, BookAccessDto, LibraryItemDto, ReadingTokenDto};
use crate::error::{ApiError, Result};
use crate::service::{library, reading_token};
use crate::state::AppState;
use crate::storage::content_type_for_key;

/// 当前用户书架
///
/// GET /api/library
pub async fn list_library(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<Vec<LibraryItemDto>>>> {
    let items = library::list(&state.pool, claims.user_id()?).await?;
    Ok(Json(ApiResponse::success(items)))
}

/// GET /api/library/{book_id}/access
pub async fn check_access(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookAccessDto>>> {
    let has_access = library::has_access(&state.pool, claims.user_id()?, book_id).await?;
    Ok(Json(ApiResponse::success(BookAccessDto {
        book_id,
        has_access,
    })))
}

/// 为已拥有的图书签发短期阅读令牌
///
/// POST /api/library/{book_id}/reading-token
pub async fn issue_reading_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReadingTokenDto>>> {
    let user_id = claims.user_id()?;
    if !library::has_access(&state.pool, user_id, book_id).await? {
        return Err(ApiError::Forbidden("您尚未拥有该图书".to_string()));
    }

    let issued = reading_token::issue(
        &state.pool,
        user_id,
        book_id,
        state.config.reading.token_ttl_secs,
    )
    .await?;

    Ok(Json(ApiResponse::success(ReadingTokenDto {
        read_url: state.public_url(&format!("/api/read/{}", issued.token)),
        token: issued.token,
        expires_at: issued.expires_at,
    })))
}

/// 凭阅读令牌读取图书文件
///
/// GET /api/read/{token}
pub async fn read_book(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response> {
    let resolved = reading_token::resolve(&state.pool, &token).await?;
    let bytes = state.storage.get(&resolved.file_key).await?;

    info!(
        user_id = %resolved.user_id,
        book_id = %resolved.book_id,
        size = bytes.len(),
        "Book file served"
    );

    Ok(file_response(bytes, content_type_for_key(&resolved.file_key)))
}
