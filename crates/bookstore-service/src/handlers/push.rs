//! Web Push 订阅

use axum::{Extension, Json, extract::State};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{ApiResponse, DeletedResponse, PushSubscribeRequest, PushUnsubscribeRequest};
use crate::error::Result;
use crate::models::PushSubscription;
use crate::state::AppState;

/// 保存订阅；同一 endpoint 重复订阅时覆盖密钥与归属
///
/// POST /api/push/subscribe
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PushSubscribeRequest>,
) -> Result<Json<ApiResponse<()>>> {
    req.validate()?;
    let user_id = claims.user_id()?;

    let subscription = sqlx::query_as::<_, PushSubscription>(
        r#"
        INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (endpoint) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                p256dh = EXCLUDED.p256dh,
                auth_key = EXCLUDED.auth_key
        RETURNING id, user_id, endpoint, p256dh, auth_key, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&req.endpoint)
    .bind(&req.keys.p256dh)
    .bind(&req.keys.auth)
    .fetch_one(&state.pool)
    .await?;

    info!(user_id = %user_id, subscription_id = %subscription.id, "Push subscription saved");
    Ok(Json(ApiResponse::success_with_message((), "订阅成功")))
}

/// POST /api/push/unsubscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PushUnsubscribeRequest>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    req.validate()?;

    sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1 AND user_id = $2")
        .bind(&req.endpoint)
        .bind(claims.user_id()?)
        .execute(&state.pool)
        .await?;

    Ok(Json(ApiResponse::success(DeletedResponse::success())))
}
