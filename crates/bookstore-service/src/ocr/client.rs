use std::time::Duration;

use async_trait::async_trait;
use bookstore_shared::config::OcrConfig;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OCR 服务返回异常状态: {0}")]
    Status(u16),
}

/// 识别引擎抽象
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// 返回识别出的全文；引擎未启用或图片无文字时返回 `None`
    async fn recognize(&self, image: &[u8], content_type: &str) -> Result<Option<String>, OcrError>;
}

/// 未配置识别服务时的占位实现
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOcr;

#[async_trait]
impl OcrEngine for NoopOcr {
    async fn recognize(&self, _image: &[u8], _content_type: &str) -> Result<Option<String>, OcrError> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: Option<String>,
}

/// 通过 HTTP 调用外部识别服务
///
/// 以 multipart 字段 `file` 上传图片，响应体形如 `{"text": "..."}`。
#[derive(Clone)]
pub struct HttpOcrClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpOcrClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_config(config: &OcrConfig) -> Result<Option<Self>, OcrError> {
        match config.endpoint.as_deref() {
            Some(endpoint) if !endpoint.is_empty() => Self::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_seconds),
            )
            .map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcrClient {
    #[instrument(skip(self, image), fields(size = image.len()))]
    async fn recognize(&self, image: &[u8], content_type: &str) -> Result<Option<String>, OcrError> {
        let part = Part::bytes(image.to_vec())
            .file_name("receipt")
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::Status(status.as_u16()));
        }

        let body: OcrResponse = response.json().await?;
        let text = body.text.filter(|t| !t.trim().is_empty());
        debug!(recognized = text.is_some(), "OCR finished");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_endpoint() {
        assert!(HttpOcrClient::from_config(&OcrConfig::default()).unwrap().is_none());

        let config = OcrConfig {
            endpoint: Some("http://localhost:9000/ocr".into()),
            ..Default::default()
        };
        assert!(HttpOcrClient::from_config(&config).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let client =
            HttpOcrClient::new("http://127.0.0.1:1/ocr", None, Duration::from_secs(2)).unwrap();
        let result = client.recognize(b"img", "image/png").await;
        assert!(matches!(result, Err(OcrError::Http(_))));
    }
}
