//! 对象存储
//!
//! 付款截图和图书文件都通过 [`ObjectStorage`] 读写，对外不直接暴露存储地址，
//! 由服务在鉴权后转发文件内容。

mod local;

pub use local::LocalStorage;

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("非法的存储 key: {0}")]
    InvalidKey(String),
    #[error("文件不存在: {0}")]
    NotFound(String),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 写入成功后的对象描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: usize,
    pub content_type: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// 校验存储 key：必须是相对路径且不能包含 `..`
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.starts_with('\\')
        || key.contains('\0')
        || key.contains(':')
        || key.split(['/', '\\']).any(|segment| segment == ".." || segment.is_empty());

    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// 付款截图的存储 key：`payments/{user_id}/{request_id}-{uuid}.{ext}`
pub fn screenshot_key(user_id: Uuid, request_id: Uuid, content_type: &str) -> String {
    format!(
        "payments/{}/{}-{}.{}",
        user_id,
        request_id,
        Uuid::new_v4().simple(),
        extension_for(content_type)
    )
}

pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "application/epub+zip" => "epub",
        _ => "bin",
    }
}

/// 根据 key 的扩展名推断 Content-Type
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("payments/u/r.png").is_ok());
        assert!(validate_key("books/dune.pdf").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("../secret").is_err());
        assert!(validate_key("books/../../secret").is_err());
        assert!(validate_key("books//double").is_err());
        assert!(validate_key("C:\\windows").is_err());
    }

    #[test]
    fn test_screenshot_key_layout() {
        let user = Uuid::new_v4();
        let request = Uuid::new_v4();
        let key = screenshot_key(user, request, "image/jpeg");

        assert!(key.starts_with(&format!("payments/{}/{}-", user, request)));
        assert!(key.ends_with(".jpg"));
        assert!(validate_key(&key).is_ok());
        assert_ne!(key, screenshot_key(user, request, "image/jpeg"));
    }

    #[test]
    fn test_content_type_for_key() {
        assert_eq!(content_type_for_key("books/a.PDF"), "application/pdf");
        assert_eq!(content_type_for_key("books/a.epub"), "application/epub+zip");
        assert_eq!(content_type_for_key("payments/x.webp"), "image/webp");
        assert_eq!(content_type_for_key("noext"), "application/octet-stream");
    }
}
