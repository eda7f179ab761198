//! 付款截图文字识别
//!
//! 识别结果只作为管理员审核的参考信息，识别失败不会阻断付款提交。

mod client;
mod parser;

pub use client::{HttpOcrClient, NoopOcr, OcrEngine, OcrError};
pub use parser::{OcrSummary, ReceiptParser, parse_amount_cents};

use std::sync::Arc;

use bookstore_shared::config::OcrConfig;
use tracing::info;

/// 根据配置选择识别引擎；未配置 endpoint 时使用 [`NoopOcr`]
pub fn build_engine(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>, OcrError> {
    match HttpOcrClient::from_config(config)? {
        Some(client) => {
            info!("HTTP OCR engine enabled");
            Ok(Arc::new(client))
        }
        None => {
            info!("OCR endpoint not configured, receipt recognition disabled");
            Ok(Arc::new(NoopOcr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_engine_without_endpoint_is_noop() {
        let engine = build_engine(&OcrConfig::default()).unwrap();
        let text = engine.recognize(b"\x89PNG", "image/png").await.unwrap();
        assert!(text.is_none());
    }
}
