//! 审计日志中间件
//!
//! 后台写操作（POST/PUT/PATCH/DELETE `/api/admin/**`）成功后写入 admin_audit_logs。

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::Claims;
use crate::models::AuditLog;
use crate::state::AppState;

const ADMIN_PREFIX: &str = "/api/admin/";

/// 审计中间件：写操作成功后异步写入日志，写入失败不影响响应
pub async fn audit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if !is_write_method(&method) || !path.starts_with(ADMIN_PREFIX) {
        return next.run(request).await;
    }

    let claims = request.extensions().get::<Claims>().cloned();
    let ip_address = extract_client_ip(&request);
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let response = next.run(request).await;

    if response.status().is_success() {
        if let Some(claims) = claims {
            let (module, action) = parse_module_action(&path, &method);
            let mut log = AuditLog::new(module, action)
                .with_operator(claims.user_id().ok(), Some(claims.email.clone()))
                .with_client_info(ip_address, user_agent);
            if let Some((target_type, target_id)) = extract_target(&path) {
                log = log.with_target(target_type, target_id);
            }

            let pool = state.pool.clone();
            tokio::spawn(async move {
                write_audit_log(&pool, &log).await;
            });
        }
    }

    response
}

fn is_write_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn admin_segments(path: &str) -> Vec<&str> {
    path.strip_prefix(ADMIN_PREFIX)
        .unwrap_or(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_resource_id(segment: &str) -> bool {
    Uuid::parse_str(segment).is_ok()
        || (!segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
}

/// 解析业务模块和操作
///
/// `/api/admin/{module}/{id}/{action}` 形式的子操作以末段为动作名，
/// `approve-purchase` / `reject-purchase` 归入 purchase-requests 模块。
fn parse_module_action(path: &str, method: &Method) -> (String, String) {
    let segments = admin_segments(path);
    let first = segments.first().copied().unwrap_or("unknown");

    if let Some(verb) = first.strip_suffix("-purchase") {
        return ("purchase-requests".to_string(), verb.to_string());
    }

    if segments.len() == 3 && !is_resource_id(segments[2]) {
        return (first.to_string(), segments[2].to_string());
    }

    if let Some(sub) = segments.get(1).copied().filter(|s| !is_resource_id(s)) {
        // 如 telegram/set-webhook
        return (first.to_string(), sub.to_string());
    }

    let action = match *method {
        Method::POST => "create",
        Method::PUT | Method::PATCH => "update",
        Method::DELETE => "delete",
        _ => "unknown",
    };
    (first.to_string(), action.to_string())
}

/// 第二段为资源 ID 时返回 (单数资源名, ID)
fn extract_target(path: &str) -> Option<(String, String)> {
    let segments = admin_segments(path);
    let module: &str = segments.first()?;
    let id: &str = segments.get(1)?;
    if !is_resource_id(id) {
        return None;
    }
    let target_type = module.strip_suffix('s').unwrap_or(module);
    Some((target_type.to_string(), id.to_string()))
}

/// 优先取反向代理设置的 X-Forwarded-For 首个地址，其次 X-Real-IP
pub(crate) fn extract_client_ip(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}

async fn write_audit_log(pool: &PgPool, log: &AuditLog) {
    let result = sqlx::query(
        r#"
        INSERT INTO admin_audit_logs
            (operator_id, operator_email, module, action, target_type, target_id, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(log.operator_id)
    .bind(&log.operator_email)
    .bind(&log.module)
    .bind(&log.action)
    .bind(&log.target_type)
    .bind(&log.target_id)
    .bind(&log.ip_address)
    .bind(&log.user_agent)
    .execute(pool)
    .await;

    match result {
        Ok(_) => debug!(module = %log.module, action = %log.action, "Audit log recorded"),
        Err(e) => error!(
            error = %e,
            module = %log.module,
            action = %log.action,
            "Failed to write audit log"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "6f1c2a52-3c4b-4d7e-9a0b-1c2d3e4f5a6b";

    #[test]
    fn test_crud_actions() {
        assert_eq!(
            parse_module_action("/api/admin/books", &Method::POST),
            ("books".to_string(), "create".to_string())
        );
        assert_eq!(
            parse_module_action(&format!("/api/admin/bundles/{ID}"), &Method::PUT),
            ("bundles".to_string(), "update".to_string())
        );
        assert_eq!(
            parse_module_action("/api/admin/payment-config/3", &Method::DELETE),
            ("payment-config".to_string(), "delete".to_string())
        );
    }

    #[test]
    fn test_sub_actions() {
        assert_eq!(
            parse_module_action(&format!("/api/admin/books/{ID}/publish"), &Method::PATCH),
            ("books".to_string(), "publish".to_string())
        );
        assert_eq!(
            parse_module_action(
                &format!("/api/admin/purchase-requests/{ID}/complete"),
                &Method::POST
            ),
            ("purchase-requests".to_string(), "complete".to_string())
        );
        assert_eq!(
            parse_module_action("/api/admin/approve-purchase", &Method::POST),
            ("purchase-requests".to_string(), "approve".to_string())
        );
        assert_eq!(
            parse_module_action("/api/admin/reject-purchase", &Method::POST),
            ("purchase-requests".to_string(), "reject".to_string())
        );
        assert_eq!(
            parse_module_action("/api/admin/telegram/set-webhook", &Method::POST),
            ("telegram".to_string(), "set-webhook".to_string())
        );
    }

    #[test]
    fn test_extract_target() {
        assert_eq!(
            extract_target(&format!("/api/admin/books/{ID}")),
            Some(("book".to_string(), ID.to_string()))
        );
        assert_eq!(
            extract_target("/api/admin/wallet-config/12"),
            Some(("wallet-config".to_string(), "12".to_string()))
        );
        assert_eq!(extract_target("/api/admin/books"), None);
        assert_eq!(extract_target("/api/admin/telegram/set-webhook"), None);
    }

    #[test]
    fn test_extract_client_ip() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request).as_deref(), Some("203.0.113.7"));

        let request = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request).as_deref(), Some("198.51.100.2"));

        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_client_ip(&request).is_none());
    }

    #[test]
    fn test_is_write_method() {
        assert!(is_write_method(&Method::POST));
        assert!(is_write_method(&Method::PATCH));
        assert!(!is_write_method(&Method::GET));
    }
}
