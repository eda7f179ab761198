//! 后台统计

use axum::{Json, extract::State};

use crate::dto::{ApiResponse, StatsOverview, StatusCount, TrendDataPoint};
use crate::error::Result;
use crate::models::PurchaseStatus;
use crate::state::AppState;

/// 后台首页统计
///
/// GET /api/admin/stats
pub async fn overview(State(state): State<AppState>) -> Result<Json<ApiResponse<StatsOverview>>> {
    let pool = &state.pool;

    let (total_users, total_books, total_bundles): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM profiles),
            (SELECT COUNT(*) FROM books),
            (SELECT COUNT(*) FROM bundles)
        "#,
    )
    .fetch_one(pool)
    .await?;

    let requests_by_status = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM purchase_requests GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    // 已提交凭证等待审核
    let awaiting_review = requests_by_status
        .iter()
        .find(|s| s.status == PurchaseStatus::AwaitingPayment)
        .map(|s| s.count)
        .unwrap_or(0);

    let revenue_cents: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM purchases")
            .fetch_one(pool)
            .await?;

    let purchase_trend = sqlx::query_as::<_, TrendDataPoint>(
        r#"
        SELECT d::date AS date,
               COUNT(p.id) AS purchases,
               COALESCE(SUM(p.amount_cents), 0)::BIGINT AS revenue_cents
        FROM generate_series(CURRENT_DATE - INTERVAL '6 days', CURRENT_DATE, INTERVAL '1 day') AS d
        LEFT JOIN purchases p ON p.created_at::date = d::date
        GROUP BY d
        ORDER BY d
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(Json(ApiResponse::success(StatsOverview {
        total_users,
        total_books,
        total_bundles,
        requests_by_status,
        awaiting_review,
        revenue_cents,
        purchase_trend,
    })))
}
