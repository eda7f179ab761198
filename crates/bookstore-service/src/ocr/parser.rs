//! 付款截图文本解析
//!
//! 从识别文本中提取金额与交易流水号，供审核页展示和比对。

use regex::Regex;
use serde::Serialize;

/// 识别结果摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrSummary {
    pub text: String,
    pub amount_cents: Option<i64>,
    pub reference: Option<String>,
    /// 识别金额是否与申请金额一致；未识别出金额时为 `None`
    pub amount_matches: Option<bool>,
}

pub struct ReceiptParser {
    labeled_amount: Regex,
    currency_amount: Regex,
    reference: Regex,
}

impl Default for ReceiptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptParser {
    pub fn new() -> Self {
        Self {
            // "Amount: 1,250.00"、"Total paid ETB 300"
            labeled_amount: Regex::new(
                r"(?i)\b(?:amount|total|paid|transferred)\b[^0-9\n]{0,20}?([0-9][0-9,]*(?:\.[0-9]{1,2})?)",
            )
            .unwrap(),
            // "$12.50"、"ETB 1,000"、"Birr 450"
            currency_amount: Regex::new(
                r"(?i)(?:\$|\b(?:ETB|USD|Birr|Br)\b\.?)\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)",
            )
            .unwrap(),
            // "Ref: FT23...", "Ref No. 123...", "Transaction ID: ...", "TXN 998..."
            reference: Regex::new(
                r"(?i)\b(?:ref(?:erence)?\b(?:\s*no\b\.?)?|transaction\s*id\b|txn\b(?:\s*id\b)?|trx\b)\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-]{3,40})",
            )
            .unwrap(),
        }
    }

    /// 提取金额（分）
    ///
    /// 优先取带 amount/total/paid 标签的数字，其次取带货币符号的数字；
    /// 同类候选有多个时取最大值。
    pub fn extract_amount(&self, text: &str) -> Option<i64> {
        Self::largest(&self.labeled_amount, text).or_else(|| Self::largest(&self.currency_amount, text))
    }

    /// 提取交易流水号（必须包含数字，统一转为大写）
    pub fn extract_reference(&self, text: &str) -> Option<String> {
        self.reference
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches('-'))
            .find(|candidate| candidate.chars().any(|c| c.is_ascii_digit()))
            .map(|candidate| candidate.to_ascii_uppercase())
    }

    pub fn summarize(&self, text: &str, expected_cents: i64) -> OcrSummary {
        let amount_cents = self.extract_amount(text);
        OcrSummary {
            text: text.to_string(),
            amount_cents,
            reference: self.extract_reference(text),
            amount_matches: amount_cents.map(|amount| amount == expected_cents),
        }
    }

    fn largest(pattern: &Regex, text: &str) -> Option<i64> {
        pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| parse_amount_cents(m.as_str()))
            .max()
    }
}

/// 将 "1,250.5" 这样的金额文本转换为分
pub fn parse_amount_cents(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() || fraction.len() > 2 {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    whole.checked_mul(100)?.checked_add(fraction)
}
