//! 管理员操作审计日志

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 审计日志实体
///
/// 记录后台所有写操作，用于追溯
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub operator_id: Option<Uuid>,
    /// 操作人邮箱（冗余存储，便于查询展示）
    pub operator_email: Option<String>,
    /// 操作模块（books、bundles、purchases 等）
    pub module: String,
    /// 操作动作（create、update、delete、approve 等）
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(module: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: 0,
            operator_id: None,
            operator_email: None,
            module: module.into(),
            action: action.into(),
            target_type: None,
            target_id: None,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_operator(mut self, id: Option<Uuid>, email: Option<String>) -> Self {
        self.operator_id = id;
        self.operator_email = email;
        self
    }

    pub fn with_target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = Some(target_id.into());
        self
    }

    /// 设置客户端信息
    pub fn with_client_info(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip;
        self.user_agent = user_agent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let operator = Uuid::new_v4();
        let log = AuditLog::new("books", "create")
            .with_operator(Some(operator), Some("admin@example.com".into()))
            .with_target("books", "abc")
            .with_client_info(Some("10.0.0.1".into()), None);

        assert_eq!(log.module, "books");
        assert_eq!(log.action, "create");
        assert_eq!(log.operator_id, Some(operator));
        assert_eq!(log.target_id.as_deref(), Some("abc"));
        assert_eq!(log.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(log.user_agent.is_none());
    }
}
