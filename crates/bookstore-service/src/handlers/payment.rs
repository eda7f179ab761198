//! 付款凭证提交与公开收据

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
};
use bookstore_shared::observability::metrics;
use tracing::{info, warn};
use uuid::Uuid;

use super::purchase_request::item_label;
use crate::auth::Claims;
use crate::dto::{ApiResponse, PaymentSubmissionDto, ReceiptDto};
use crate::error::{ApiError, Result};
use crate::notification::NotificationKind;
use crate::ocr::{OcrSummary, parse_amount_cents};
use crate::service::format_money;
use crate::service::purchase_workflow::{self, PaymentSubmission};
use crate::state::AppState;
use crate::storage::screenshot_key;

/// 上传的截图
#[derive(Debug)]
struct UploadedFile {
    content_type: String,
    bytes: Vec<u8>,
}

/// 解析后的表单
#[derive(Debug, Default)]
struct SubmissionForm {
    purchase_request_id: Option<String>,
    payment_method: Option<String>,
    transaction_reference: Option<String>,
    amount: Option<String>,
    screenshot: Option<UploadedFile>,
}

impl SubmissionForm {
    /// 校验必填字段，返回 (申请 ID, 支付方式, 截图, 参考号, 声明金额)
    fn into_parts(self) -> Result<(Uuid, String, UploadedFile, Option<String>, Option<i64>)> {
        let request_id = self
            .purchase_request_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::Validation("缺少 purchaseRequestId".to_string()))?;
        let request_id = Uuid::parse_str(request_id)
            .map_err(|_| ApiError::Validation("purchaseRequestId 格式不正确".to_string()))?;

        let payment_method = non_empty(self.payment_method)
            .ok_or_else(|| ApiError::Validation("缺少 paymentMethod".to_string()))?;
        if payment_method.len() > 50 {
            return Err(ApiError::Validation("paymentMethod 不超过50字符".to_string()));
        }

        let screenshot = self
            .screenshot
            .ok_or_else(|| ApiError::Validation("缺少付款截图 screenshot".to_string()))?;

        let reference = non_empty(self.transaction_reference);
        if reference.as_ref().is_some_and(|r| r.len() > 100) {
            return Err(ApiError::Validation("transactionReference 不超过100字符".to_string()));
        }

        let claimed = match non_empty(self.amount) {
            Some(raw) => Some(
                parse_amount_cents(&raw)
                    .ok_or_else(|| ApiError::Validation(format!("金额格式不正确: {}", raw)))?,
            ),
            None => None,
        };

        Ok((request_id, payment_method, screenshot, reference, claimed))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(max_bytes)
    } else {
        err.into()
    }
}

async fn read_form(
    multipart: &mut Multipart,
    max_bytes: usize,
    allowed_types: &[String],
) -> Result<SubmissionForm> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "screenshot" => {
                let content_type = field
                    .content_type()
                    .map(|ct| ct.to_ascii_lowercase())
                    .unwrap_or_default();
                if !allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&content_type)) {
                    return Err(ApiError::UnsupportedMediaType(content_type));
                }
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, max_bytes))?;
                if bytes.len() > max_bytes {
                    return Err(ApiError::PayloadTooLarge(max_bytes));
                }
                if bytes.is_empty() {
                    return Err(ApiError::Validation("付款截图为空".to_string()));
                }
                form.screenshot = Some(UploadedFile {
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "purchaseRequestId" | "paymentMethod" | "transactionReference" | "amount" => {
                let value = field.text().await.map_err(|e| multipart_error(e, max_bytes))?;
                match name.as_str() {
                    "purchaseRequestId" => form.purchase_request_id = Some(value),
                    "paymentMethod" => form.payment_method = Some(value),
                    "transactionReference" => form.transaction_reference = Some(value),
                    _ => form.amount = Some(value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// 对截图做 OCR；失败只记录日志
async fn recognize(state: &AppState, file: &UploadedFile, expected_cents: i64) -> Option<OcrSummary> {
    match state.ocr.recognize(&file.bytes, &file.content_type).await {
        Ok(Some(text)) if !text.trim().is_empty() => {
            metrics::record_payment_submission("recognized");
            Some(state.receipt_parser.summarize(&text, expected_cents))
        }
        Ok(_) => {
            metrics::record_payment_submission("skipped");
            None
        }
        Err(e) => {
            metrics::record_payment_submission("failed");
            warn!(error = %e, "OCR failed, continuing without it");
            None
        }
    }
}

async fn customer_name(state: &AppState, user_id: Uuid) -> String {
    sqlx::query_scalar::<_, String>("SELECT COALESCE(display_name, email) FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| user_id.to_string())
}

/// 提交付款截图
///
/// POST /api/payments/submit（multipart）
pub async fn submit_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<PaymentSubmissionDto>>> {
    let user_id = claims.user_id()?;
    let storage_config = &state.config.storage;

    let form = read_form(
        &mut multipart,
        storage_config.max_upload_bytes,
        &storage_config.allowed_content_types,
    )
    .await?;
    let (request_id, payment_method, file, reference, claimed) = form.into_parts()?;

    // 先校验申请归属与状态，避免写入无用文件
    let current = purchase_workflow::find_request(&state.pool, request_id).await?;
    if current.user_id != user_id {
        return Err(ApiError::PurchaseRequestNotFound(request_id));
    }
    purchase_workflow::status_after_submission(current.status)?;

    let key = screenshot_key(user_id, request_id, &file.content_type);
    let stored = state
        .storage
        .put(&key, file.bytes.clone(), &file.content_type)
        .await?;

    let ocr = recognize(&state, &file, current.amount_cents).await;

    let outcome = match purchase_workflow::record_payment_submission(
        &state.pool,
        request_id,
        user_id,
        PaymentSubmission {
            screenshot_key: stored.key.clone(),
            payment_method: payment_method.clone(),
            transaction_reference: reference.clone(),
            claimed_amount_cents: claimed,
            ocr: ocr.clone(),
        },
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&stored.key).await {
                warn!(key = %stored.key, error = %cleanup, "Failed to remove orphaned screenshot");
            }
            return Err(e);
        }
    };

    if let Some(old) = outcome.replaced_screenshot.as_deref() {
        if let Err(e) = state.storage.delete(old).await {
            warn!(key = %old, error = %e, "Failed to remove replaced screenshot");
        }
    }

    let request = outcome.request;
    let receipt_url = state.public_url(&format!("/api/receipts/{}", request.id));
    let screenshot_url = state.public_url(&format!("/api/purchase-requests/{}/screenshot", request.id));

    let title = item_label(&state, &request).await;
    let customer = customer_name(&state, user_id).await;
    state.notifier.spawn_notify_admin(
        NotificationKind::PaymentSubmitted,
        vec![
            ("customer", customer),
            ("item_title", title),
            ("amount", format_money(request.amount_cents, &request.currency)),
            ("payment_method", payment_method),
            ("reference", reference.unwrap_or_else(|| "-".to_string())),
            ("receipt_url", receipt_url.clone()),
            ("request_id", request.id.to_string()),
        ],
    );

    info!(
        request_id = %request.id,
        size = stored.size,
        ocr = ocr.is_some(),
        "Payment evidence submitted"
    );

    Ok(Json(ApiResponse::success(PaymentSubmissionDto {
        request_id: request.id,
        status: request.status,
        receipt_url,
        screenshot_url,
        ocr,
    })))
}

/// 公开收据
///
/// GET /api/receipts/{id}
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReceiptDto>>> {
    let receipt = sqlx::query_as::<_, ReceiptDto>(
        r#"
        SELECT pr.id AS request_id, pr.item_type,
               CASE pr.item_type
                   WHEN 'book' THEN (SELECT title FROM books WHERE id = pr.item_id)
                   ELSE (SELECT title FROM bundles WHERE id = pr.item_id)
               END AS item_title,
               pr.amount_cents, pr.currency, pr.payment_method, pr.status,
               p.display_name AS customer_name,
               pr.transaction_reference, pr.payment_submitted_at, pr.created_at
        FROM purchase_requests pr
        JOIN profiles p ON p.id = pr.user_id
        WHERE pr.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::PurchaseRequestNotFound(id))?;

    Ok(Json(ApiResponse::success(receipt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SubmissionForm {
        SubmissionForm {
            purchase_request_id: Some(Uuid::nil().to_string()),
            payment_method: Some(" telebirr ".into()),
            transaction_reference: Some("  ".into()),
            amount: Some("1,250.50".into()),
            screenshot: Some(UploadedFile {
                content_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            }),
        }
    }

    #[test]
    fn test_form_parts() {
        let (id, method, file, reference, claimed) = form().into_parts().unwrap();
        assert_eq!(id, Uuid::nil());
        assert_eq!(method, "telebirr");
        assert_eq!(file.bytes, vec![1, 2, 3]);
        assert!(reference.is_none());
        assert_eq!(claimed, Some(125_050));
    }

    #[test]
    fn test_form_requires_screenshot() {
        let mut f = form();
        f.screenshot = None;
        assert!(matches!(f.into_parts(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_form_rejects_bad_request_id() {
        let mut f = form();
        f.purchase_request_id = Some("not-a-uuid".into());
        assert!(matches!(f.into_parts(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_form_rejects_bad_amount() {
        let mut f = form();
        f.amount = Some("abc".into());
        assert!(matches!(f.into_parts(), Err(ApiError::Validation(_))));
    }
}
