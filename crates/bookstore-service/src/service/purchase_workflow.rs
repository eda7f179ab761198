//! 购买申请工作流
//!
//! 所有状态变更都在事务中先 `SELECT ... FOR UPDATE` 锁定申请，
//! 再经 [`PurchaseStatus::can_transition_to`] 校验后写入。
//! 审核通过时在同一事务中写入订单并发放书架。

use bookstore_shared::observability::metrics;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{catalog, library};
use crate::error::{ApiError, Result};
use crate::models::{ItemType, PurchaseRequest, PurchaseStatus, RequestSource};
use crate::ocr::OcrSummary;

pub const CANCELLED_BY_USER: &str = "cancelled by user";

const REQUEST_COLUMNS: &str = "id, user_id, item_type, item_id, amount_cents, currency, \
     payment_method, status, source, telegram_chat_id, screenshot_key, transaction_reference, \
     claimed_amount_cents, ocr_text, ocr_amount_cents, ocr_reference, payment_submitted_at, \
     admin_note, rejection_reason, reviewed_by, reviewed_at, created_at, updated_at";

/// 新建申请参数
#[derive(Debug, Clone)]
pub struct NewPurchaseRequest {
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub payment_method: String,
    pub source: RequestSource,
    pub telegram_chat_id: Option<i64>,
}

/// 创建结果，附带商品名称便于回复和通知
#[derive(Debug, Clone)]
pub struct CreatedRequest {
    pub request: PurchaseRequest,
    pub item_title: String,
}

/// 付款凭证
#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    pub screenshot_key: String,
    pub payment_method: String,
    pub transaction_reference: Option<String>,
    pub claimed_amount_cents: Option<i64>,
    pub ocr: Option<OcrSummary>,
}

#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub request: PurchaseRequest,
    /// 被替换掉的旧截图，调用方负责清理
    pub replaced_screenshot: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Approval {
    pub request: PurchaseRequest,
    pub purchase_id: Uuid,
    pub granted_books: u64,
}

pub fn check_transition(from: PurchaseStatus, to: PurchaseStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ApiError::InvalidTransition { from, to })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub async fn find_request(pool: &PgPool, id: Uuid) -> Result<PurchaseRequest> {
    let sql = format!("SELECT {} FROM purchase_requests WHERE id = $1", REQUEST_COLUMNS);
    sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::PurchaseRequestNotFound(id))
}

/// 事务内锁定申请
async fn lock_request(conn: &mut PgConnection, id: Uuid) -> Result<PurchaseRequest> {
    let sql = format!(
        "SELECT {} FROM purchase_requests WHERE id = $1 FOR UPDATE",
        REQUEST_COLUMNS
    );
    sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(ApiError::PurchaseRequestNotFound(id))
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<PurchaseRequest>> {
    let sql = format!(
        "SELECT {} FROM purchase_requests WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        REQUEST_COLUMNS
    );
    let requests = sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(requests)
}

/// 后台列表，可按状态过滤
pub async fn list_all(
    pool: &PgPool,
    status: Option<PurchaseStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<PurchaseRequest>, i64)> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM purchase_requests WHERE ($1::varchar IS NULL OR status = $1)",
    )
    .bind(status)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        r#"
        SELECT {} FROM purchase_requests
        WHERE ($1::varchar IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        REQUEST_COLUMNS
    );
    let items = sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok((items, total))
}

/// 创建购买申请
///
/// 价格取自已上架商品的当前价格；已拥有或已有未结申请时返回 409。
#[instrument(skip(pool, new), fields(user_id = %new.user_id, item_id = %new.item_id))]
pub async fn create_request(pool: &PgPool, new: NewPurchaseRequest) -> Result<CreatedRequest> {
    let item = catalog::published_item(pool, new.item_type, new.item_id).await?;

    if library::user_owns_item(pool, new.user_id, new.item_type, new.item_id).await? {
        return Err(ApiError::AlreadyOwned);
    }

    let open_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM purchase_requests
            WHERE user_id = $1 AND item_type = $2 AND item_id = $3
              AND status = ANY($4::text[])
        )
        "#,
    )
    .bind(new.user_id)
    .bind(new.item_type)
    .bind(new.item_id)
    .bind(PurchaseStatus::open_names())
    .fetch_one(pool)
    .await?;
    if open_exists {
        return Err(ApiError::DuplicateRequest);
    }

    let sql = format!(
        r#"
        INSERT INTO purchase_requests
            (id, user_id, item_type, item_id, amount_cents, currency, payment_method,
             status, source, telegram_chat_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9)
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    );
    let request = sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.item_type)
        .bind(new.item_id)
        .bind(item.price_cents)
        .bind(&item.currency)
        .bind(&new.payment_method)
        .bind(new.source)
        .bind(new.telegram_chat_id)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            // 并发下单由部分唯一索引兜底
            if is_unique_violation(&e) {
                ApiError::DuplicateRequest
            } else {
                ApiError::Database(e)
            }
        })?;

    metrics::record_purchase_request(new.source.as_str(), new.item_type.as_str());
    info!(request_id = %request.id, amount_cents = request.amount_cents, "Purchase request created");

    Ok(CreatedRequest {
        request,
        item_title: item.title,
    })
}

/// 后台推进状态（contacted / awaiting_payment）
pub async fn transition(
    pool: &PgPool,
    id: Uuid,
    to: PurchaseStatus,
    note: Option<&str>,
    reviewer: Option<Uuid>,
) -> Result<PurchaseRequest> {
    let mut tx = pool.begin().await?;
    let current = lock_request(&mut tx, id).await?;
    check_transition(current.status, to)?;

    let sql = format!(
        r#"
        UPDATE purchase_requests
        SET status = $2, admin_note = COALESCE($3, admin_note),
            reviewed_by = COALESCE($4, reviewed_by), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    );
    let updated = sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(id)
        .bind(to)
        .bind(note)
        .bind(reviewer)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(request_id = %id, from = %current.status, to = %to, "Purchase request status changed");
    Ok(updated)
}

/// 审核通过：更新状态、写入订单、发放书架，全部在一个事务内
#[instrument(skip(pool, note))]
pub async fn approve(
    pool: &PgPool,
    id: Uuid,
    reviewer: Uuid,
    note: Option<&str>,
) -> Result<Approval> {
    let mut tx = pool.begin().await?;
    let current = lock_request(&mut tx, id).await?;
    check_transition(current.status, PurchaseStatus::Approved)?;

    let book_ids = library::book_ids_for_item(&mut tx, current.item_type, current.item_id).await?;
    if book_ids.is_empty() {
        return Err(ApiError::Conflict("商品不包含任何图书，无法发放".to_string()));
    }

    let sql = format!(
        r#"
        UPDATE purchase_requests
        SET status = 'approved', admin_note = COALESCE($3, admin_note),
            reviewed_by = $2, reviewed_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    );
    let request = sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(id)
        .bind(reviewer)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

    let purchase_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO purchases (id, user_id, item_type, item_id, amount_cents, currency, request_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(purchase_id)
    .bind(request.user_id)
    .bind(request.item_type)
    .bind(request.item_id)
    .bind(request.amount_cents)
    .bind(&request.currency)
    .bind(request.id)
    .execute(&mut *tx)
    .await?;

    let granted_books =
        library::grant_books(&mut tx, request.user_id, &book_ids, Some(purchase_id)).await?;

    tx.commit().await?;

    metrics::record_purchase_review("approved");
    info!(
        request_id = %id,
        purchase_id = %purchase_id,
        granted_books,
        "Purchase approved"
    );

    Ok(Approval {
        request,
        purchase_id,
        granted_books,
    })
}

async fn reject_locked(
    conn: &mut PgConnection,
    current: &PurchaseRequest,
    reviewer: Option<Uuid>,
    reason: &str,
) -> Result<PurchaseRequest> {
    check_transition(current.status, PurchaseStatus::Rejected)?;

    let sql = format!(
        r#"
        UPDATE purchase_requests
        SET status = 'rejected', rejection_reason = $3,
            reviewed_by = $2, reviewed_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    );
    let request = sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(current.id)
        .bind(reviewer)
        .bind(reason)
        .fetch_one(conn)
        .await?;
    Ok(request)
}

/// 审核拒绝（任意未结状态）
pub async fn reject(pool: &PgPool, id: Uuid, reviewer: Uuid, reason: &str) -> Result<PurchaseRequest> {
    let mut tx = pool.begin().await?;
    let current = lock_request(&mut tx, id).await?;
    let request = reject_locked(&mut tx, &current, Some(reviewer), reason).await?;
    tx.commit().await?;

    metrics::record_purchase_review("rejected");
    info!(request_id = %id, "Purchase rejected");
    Ok(request)
}

/// 已通过的申请标记为完结
pub async fn complete(pool: &PgPool, id: Uuid, reviewer: Uuid) -> Result<PurchaseRequest> {
    let request = transition(pool, id, PurchaseStatus::Completed, None, Some(reviewer)).await?;
    metrics::record_purchase_review("completed");
    Ok(request)
}

/// 用户取消：仅限本人且仍为 pending
pub async fn cancel_by_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<PurchaseRequest> {
    let mut tx = pool.begin().await?;
    let current = lock_request(&mut tx, id).await?;
    if current.user_id != user_id {
        return Err(ApiError::PurchaseRequestNotFound(id));
    }
    if current.status != PurchaseStatus::Pending {
        return Err(ApiError::Conflict("只有待处理的申请可以取消".to_string()));
    }

    let request = reject_locked(&mut tx, &current, None, CANCELLED_BY_USER).await?;
    tx.commit().await?;

    info!(request_id = %id, "Purchase request cancelled by user");
    Ok(request)
}

/// 付款提交后的目标状态；awaiting_payment 下允许重复提交
pub fn status_after_submission(current: PurchaseStatus) -> Result<PurchaseStatus> {
    match current {
        PurchaseStatus::AwaitingPayment => Ok(current),
        other => {
            check_transition(other, PurchaseStatus::AwaitingPayment)?;
            Ok(PurchaseStatus::AwaitingPayment)
        }
    }
}

/// 记录付款凭证并推进到 awaiting_payment
#[instrument(skip(pool, submission))]
pub async fn record_payment_submission(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    submission: PaymentSubmission,
) -> Result<SubmissionOutcome> {
    let mut tx = pool.begin().await?;
    let current = lock_request(&mut tx, id).await?;
    if current.user_id != user_id {
        return Err(ApiError::PurchaseRequestNotFound(id));
    }
    let next = status_after_submission(current.status)?;

    let (ocr_text, ocr_amount, ocr_reference) = match &submission.ocr {
        Some(ocr) => (Some(ocr.text.as_str()), ocr.amount_cents, ocr.reference.as_deref()),
        None => (None, None, None),
    };

    let sql = format!(
        r#"
        UPDATE purchase_requests
        SET status = $2, screenshot_key = $3, payment_method = $4,
            transaction_reference = $5, claimed_amount_cents = $6,
            ocr_text = $7, ocr_amount_cents = $8, ocr_reference = $9,
            payment_submitted_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    );
    let request = sqlx::query_as::<_, PurchaseRequest>(&sql)
        .bind(id)
        .bind(next)
        .bind(&submission.screenshot_key)
        .bind(&submission.payment_method)
        .bind(submission.transaction_reference.as_deref())
        .bind(submission.claimed_amount_cents)
        .bind(ocr_text)
        .bind(ocr_amount)
        .bind(ocr_reference)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    let replaced_screenshot = current
        .screenshot_key
        .filter(|old| *old != submission.screenshot_key);

    info!(request_id = %id, status = %next, "Payment submission recorded");
    Ok(SubmissionOutcome {
        request,
        replaced_screenshot,
    })
}

/// 将最后一次变动早于 `idle_since` 的未结申请置为 expired
///
/// 以 `updated_at` 计时，提交付款凭证或后台推进都会重新计时。
pub async fn expire_stale(pool: &PgPool, idle_since: DateTime<Utc>) -> std::result::Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE purchase_requests
        SET status = $1, updated_at = NOW()
        WHERE status = ANY($2::text[])
          AND updated_at < $3
        "#,
    )
    .bind(PurchaseStatus::Expired)
    .bind(PurchaseStatus::names_transitioning_to(PurchaseStatus::Expired))
    .bind(idle_since)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transition() {
        assert!(check_transition(PurchaseStatus::Pending, PurchaseStatus::Contacted).is_ok());
        assert!(check_transition(PurchaseStatus::AwaitingPayment, PurchaseStatus::Approved).is_ok());

        let err = check_transition(PurchaseStatus::Pending, PurchaseStatus::Approved).unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidTransition {
                from: PurchaseStatus::Pending,
                to: PurchaseStatus::Approved
            }
        ));
        assert!(check_transition(PurchaseStatus::Rejected, PurchaseStatus::Approved).is_err());
        assert!(check_transition(PurchaseStatus::Approved, PurchaseStatus::Rejected).is_err());
    }

    #[test]
    fn test_status_after_submission() {
        assert_eq!(
            status_after_submission(PurchaseStatus::Pending).unwrap(),
            PurchaseStatus::AwaitingPayment
        );
        assert_eq!(
            status_after_submission(PurchaseStatus::Contacted).unwrap(),
            PurchaseStatus::AwaitingPayment
        );
        assert_eq!(
            status_after_submission(PurchaseStatus::AwaitingPayment).unwrap(),
            PurchaseStatus::AwaitingPayment
        );

        for closed in [
            PurchaseStatus::Approved,
            PurchaseStatus::Rejected,
            PurchaseStatus::Completed,
            PurchaseStatus::Expired,
        ] {
            assert!(status_after_submission(closed).is_err());
        }
    }
}
