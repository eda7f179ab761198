//! 书店领域模型

pub mod audit_log;
pub mod entities;
pub mod enums;

pub use audit_log::AuditLog;
pub use entities::{
    Book, Bundle, PaymentMethodConfig, Profile, Purchase, PurchaseRequest, PushSubscription,
    WalletConfig,
};
pub use enums::{ItemType, PurchaseStatus, RequestSource, UserRole};
