//! 收款配置 API 处理器

use axum::{
    Json,
    extract::{Path, State},
};
use bookstore_shared::cache::CacheKey;
use tracing::{info, warn};
use validator::Validate;

use crate::dto::{
    ApiResponse, DeletedResponse, PaymentMethodDto, PaymentMethodRequest, PublicPaymentConfigDto,
    WalletDto, WalletRequest,
};
use crate::error::{ApiError, Result};
use crate::models::{PaymentMethodConfig, WalletConfig};
use crate::service::payment_config;
use crate::state::AppState;

const METHOD_COLUMNS: &str = "id, method_code, display_name, account_name, account_number, \
     instructions, enabled, sort_order, created_at, updated_at";
const WALLET_COLUMNS: &str = "id, network, address, label, enabled, created_at, updated_at";

async fn invalidate(state: &AppState) {
    if let Err(e) = state.cache.delete(&CacheKey::payment_config()).await {
        warn!(error = %e, "Failed to invalidate payment config cache");
    }
}

fn map_unique(e: sqlx::Error, what: &str) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::Conflict(format!("{}已存在", what))
        }
        _ => ApiError::Database(e),
    }
}

/// 结账页公开收款配置
///
/// GET /api/payment-config
pub async fn get_public_config(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PublicPaymentConfigDto>>> {
    let config = payment_config::load_public_config_cached(&state.pool, &state.cache).await?;
    Ok(Json(ApiResponse::success(config)))
}

// ==================== 收款方式 ====================

/// GET /api/admin/payment-methods
pub async fn list_methods(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PaymentMethodDto>>>> {
    let sql = format!(
        "SELECT {} FROM payment_config ORDER BY sort_order, id",
        METHOD_COLUMNS
    );
    let methods = sqlx::query_as::<_, PaymentMethodConfig>(&sql)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(ApiResponse::success(
        methods.into_iter().map(PaymentMethodDto::from).collect(),
    )))
}

/// POST /api/admin/payment-methods
pub async fn create_method(
    State(state): State<AppState>,
    Json(req): Json<PaymentMethodRequest>,
) -> Result<Json<ApiResponse<PaymentMethodDto>>> {
    req.validate()?;

    let sql = format!(
        r#"
        INSERT INTO payment_config
            (method_code, display_name, account_name, account_number, instructions, enabled, sort_order)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        METHOD_COLUMNS
    );
    let method = sqlx::query_as::<_, PaymentMethodConfig>(&sql)
        .bind(req.method_code.trim())
        .bind(&req.display_name)
        .bind(&req.account_name)
        .bind(&req.account_number)
        .bind(&req.instructions)
        .bind(req.enabled.unwrap_or(true))
        .bind(req.sort_order.unwrap_or(0))
        .fetch_one(&state.pool)
        .await
        .map_err(|e| map_unique(e, "收款方式编码"))?;

    invalidate(&state).await;
    info!(method_id = method.id, code = %method.method_code, "Payment method created");

    Ok(Json(ApiResponse::success(method.into())))
}

/// PUT /api/admin/payment-methods/{id}
pub async fn update_method(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PaymentMethodRequest>,
) -> Result<Json<ApiResponse<PaymentMethodDto>>> {
    req.validate()?;

    let sql = format!(
        r#"
        UPDATE payment_config SET
            method_code = $2, display_name = $3, account_name = $4, account_number = $5,
            instructions = $6,
            enabled = COALESCE($7, enabled),
            sort_order = COALESCE($8, sort_order),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        METHOD_COLUMNS
    );
    let method = sqlx::query_as::<_, PaymentMethodConfig>(&sql)
        .bind(id)
        .bind(req.method_code.trim())
        .bind(&req.display_name)
        .bind(&req.account_name)
        .bind(&req.account_number)
        .bind(&req.instructions)
        .bind(req.enabled)
        .bind(req.sort_order)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| map_unique(e, "收款方式编码"))?
        .ok_or_else(|| ApiError::NotFound(format!("收款方式 {}", id)))?;

    invalidate(&state).await;
    info!(method_id = id, "Payment method updated");

    Ok(Json(ApiResponse::success(method.into())))
}

/// DELETE /api/admin/payment-methods/{id}
pub async fn delete_method(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    let result = sqlx::query("DELETE FROM payment_config WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("收款方式 {}", id)));
    }

    invalidate(&state).await;
    info!(method_id = id, "Payment method deleted");

    Ok(Json(ApiResponse::success(DeletedResponse::success())))
}

// ==================== 钱包 ====================

/// GET /api/admin/wallets
pub async fn list_wallets(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<WalletDto>>>> {
    let sql = format!("SELECT {} FROM wallet_config ORDER BY network, id", WALLET_COLUMNS);
    let wallets = sqlx::query_as::<_, WalletConfig>(&sql)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(ApiResponse::success(
        wallets.into_iter().map(WalletDto::from).collect(),
    )))
}

/// POST /api/admin/wallets
pub async fn create_wallet(
    State(state): State<AppState>,
    Json(req): Json<WalletRequest>,
) -> Result<Json<ApiResponse<WalletDto>>> {
    req.validate()?;

    let sql = format!(
        r#"
        INSERT INTO wallet_config (network, address, label, enabled)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        WALLET_COLUMNS
    );
    let wallet = sqlx::query_as::<_, WalletConfig>(&sql)
        .bind(req.network.trim())
        .bind(req.address.trim())
        .bind(&req.label)
        .bind(req.enabled.unwrap_or(true))
        .fetch_one(&state.pool)
        .await
        .map_err(|e| map_unique(e, "钱包地址"))?;

    invalidate(&state).await;
    info!(wallet_id = wallet.id, network = %wallet.network, "Wallet created");

    Ok(Json(ApiResponse::success(wallet.into())))
}

/// PUT /api/admin/wallets/{id}
pub async fn update_wallet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<WalletRequest>,
) -> Result<Json<ApiResponse<WalletDto>>> {
    req.validate()?;

    let sql = format!(
        r#"
        UPDATE wallet_config SET
            network = $2, address = $3, label = $4,
            enabled = COALESCE($5, enabled),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        WALLET_COLUMNS
    );
    let wallet = sqlx::query_as::<_, WalletConfig>(&sql)
        .bind(id)
        .bind(req.network.trim())
        .bind(req.address.trim())
        .bind(&req.label)
        .bind(req.enabled)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| map_unique(e, "钱包地址"))?
        .ok_or_else(|| ApiError::NotFound(format!("钱包 {}", id)))?;

    invalidate(&state).await;
    info!(wallet_id = id, "Wallet updated");

    Ok(Json(ApiResponse::success(wallet.into())))
}

/// DELETE /api/admin/wallets/{id}
pub async fn delete_wallet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    let result = sqlx::query("DELETE FROM wallet_config WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("钱包 {}", id)));
    }

    invalidate(&state).await;
    info!(wallet_id = id, "Wallet deleted");

    Ok(Json(ApiResponse::success(DeletedResponse::success())))
}
