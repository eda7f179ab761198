//! 中间件模块
//!
//! 提供认证、管理员权限、限流、审计日志与安全头中间件

mod audit;
mod auth;
mod rate_limit;
mod security_headers;

pub use audit::audit_middleware;
pub use auth::{auth_middleware, require_admin};
pub use rate_limit::rate_limit_middleware;
pub use security_headers::security_headers;
