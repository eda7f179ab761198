//! 本地磁盘存储实现

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{ObjectStorage, StorageError, StoredObject, validate_key};

/// 将对象写入根目录下的相对路径
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!(root = %root.display(), "Local object storage initialized");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size = bytes.len();
        tokio::fs::write(&path, bytes).await?;
        debug!(key, size, "Object stored");

        Ok(StoredObject {
            key: key.to_string(),
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // 删除不存在的文件视为成功
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let stored = storage
            .put("payments/u1/r1.png", b"\x89PNG".to_vec(), "image/png")
            .await
            .unwrap();
        assert_eq!(stored.size, 4);
        assert!(dir.path().join("payments/u1/r1.png").exists());

        let bytes = storage.get("payments/u1/r1.png").await.unwrap();
        assert_eq!(bytes, b"\x89PNG");

        storage.delete("payments/u1/r1.png").await.unwrap();
        assert!(matches!(
            storage.get("payments/u1/r1.png").await,
            Err(StorageError::NotFound(_))
        ));
        // 重复删除不报错
        storage.delete("payments/u1/r1.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("root"));

        let result = storage.put("../escape.txt", b"x".to_vec(), "text/plain").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert!(!dir.path().join("escape.txt").exists());
    }
}
