//! 套装 API 处理器

use axum::{
    Json,
    extract::{Path, State},
};
use bookstore_shared::cache::CacheKey;
use futures::future::try_join_all;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    ApiResponse, BundleDto, CreateBundleRequest, DeletedResponse, SetBundleBooksRequest,
    UpdateBundleRequest,
};
use crate::error::{ApiError, Result};
use crate::models::{Bundle, ItemType};
use crate::service::catalog::{self, BUNDLE_COLUMNS};
use crate::state::AppState;

const DEFAULT_CURRENCY: &str = "ETB";

async fn list_bundle_dtos(state: &AppState, public: bool) -> Result<Vec<BundleDto>> {
    let sql = format!(
        "SELECT {} FROM bundles WHERE (published OR NOT $1) ORDER BY created_at DESC",
        BUNDLE_COLUMNS
    );
    let bundles = sqlx::query_as::<_, Bundle>(&sql)
        .bind(public)
        .fetch_all(&state.pool)
        .await?;

    try_join_all(
        bundles
            .into_iter()
            .map(|bundle| catalog::bundle_dto(&state.pool, bundle, public)),
    )
    .await
}

/// 已上架套装列表
///
/// GET /api/bundles
pub async fn list_bundles(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<BundleDto>>>> {
    let bundles =
        catalog::read_through(&state.cache, &CacheKey::bundle_list(), list_bundle_dtos(&state, true))
            .await?;
    Ok(Json(ApiResponse::success(bundles)))
}

/// GET /api/bundles/{id}
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BundleDto>>> {
    let key = CacheKey::bundle_detail(&id.to_string());
    let bundle = catalog::read_through(&state.cache, &key, async {
        let bundle = catalog::find_bundle(&state.pool, id, true).await?;
        catalog::bundle_dto(&state.pool, bundle, true).await
    })
    .await?;
    Ok(Json(ApiResponse::success(bundle)))
}

/// 后台套装列表（含未上架）
///
/// GET /api/admin/bundles
pub async fn admin_list_bundles(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<BundleDto>>>> {
    let bundles = list_bundle_dtos(&state, false).await?;
    Ok(Json(ApiResponse::success(bundles)))
}

/// GET /api/admin/bundles/{id}
pub async fn admin_get_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BundleDto>>> {
    let bundle = catalog::find_bundle(&state.pool, id, false).await?;
    let dto = catalog::bundle_dto(&state.pool, bundle, false).await?;
    Ok(Json(ApiResponse::success(dto)))
}

/// 创建套装及其成员
///
/// POST /api/admin/bundles
pub async fn create_bundle(
    State(state): State<AppState>,
    Json(req): Json<CreateBundleRequest>,
) -> Result<Json<ApiResponse<BundleDto>>> {
    req.validate()?;

    let mut tx = state.pool.begin().await?;
    let sql = format!(
        r#"
        INSERT INTO bundles (id, title, description, cover_url, price_cents, currency, published)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        BUNDLE_COLUMNS
    );
    let bundle = sqlx::query_as::<_, Bundle>(&sql)
        .bind(Uuid::new_v4())
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.cover_url)
        .bind(req.price_cents)
        .bind(req.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))
        .bind(req.published.unwrap_or(false))
        .fetch_one(&mut *tx)
        .await?;

    catalog::replace_bundle_books(&mut tx, bundle.id, &req.book_ids).await?;
    tx.commit().await?;

    catalog::invalidate_cache(&state.cache).await;
    info!(bundle_id = %bundle.id, books = req.book_ids.len(), "Bundle created");

    let dto = catalog::bundle_dto(&state.pool, bundle, false).await?;
    Ok(Json(ApiResponse::success(dto)))
}

/// PUT /api/admin/bundles/{id}
pub async fn update_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBundleRequest>,
) -> Result<Json<ApiResponse<BundleDto>>> {
    req.validate()?;

    let sql = format!(
        r#"
        UPDATE bundles SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            cover_url = COALESCE($4, cover_url),
            price_cents = COALESCE($5, price_cents),
            currency = COALESCE($6, currency),
            published = COALESCE($7, published),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        BUNDLE_COLUMNS
    );
    let bundle = sqlx::query_as::<_, Bundle>(&sql)
        .bind(id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.cover_url)
        .bind(req.price_cents)
        .bind(&req.currency)
        .bind(req.published)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::BundleNotFound(id))?;

    catalog::invalidate_cache(&state.cache).await;
    info!(bundle_id = %id, "Bundle updated");

    let dto = catalog::bundle_dto(&state.pool, bundle, false).await?;
    Ok(Json(ApiResponse::success(dto)))
}

/// 整体替换套装成员
///
/// PUT /api/admin/bundles/{id}/books
pub async fn set_bundle_books(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetBundleBooksRequest>,
) -> Result<Json<ApiResponse<BundleDto>>> {
    req.validate()?;

    let bundle = catalog::find_bundle(&state.pool, id, false).await?;
    let mut tx = state.pool.begin().await?;
    catalog::replace_bundle_books(&mut tx, id, &req.book_ids).await?;
    sqlx::query("UPDATE bundles SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    catalog::invalidate_cache(&state.cache).await;
    info!(bundle_id = %id, books = req.book_ids.len(), "Bundle books replaced");

    let dto = catalog::bundle_dto(&state.pool, bundle, false).await?;
    Ok(Json(ApiResponse::success(dto)))
}

/// DELETE /api/admin/bundles/{id}
pub async fn delete_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    if catalog::item_in_use(&state.pool, ItemType::Bundle, id).await? {
        return Err(ApiError::Conflict(
            "该套装仍有未结申请或订单，无法删除".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM bundles WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::BundleNotFound(id));
    }

    catalog::invalidate_cache(&state.cache).await;
    info!(bundle_id = %id, "Bundle deleted");

    Ok(Json(ApiResponse::success(DeletedResponse::success())))
}
