//! 业务服务层
//!
//! handler 负责参数校验与权限判断，需要事务或跨表一致性的逻辑集中在这里。

pub mod catalog;
pub mod library;
pub mod payment_config;
pub mod purchase_workflow;
pub mod reading_token;

/// 金额展示："ETB 1,250.00"
pub fn format_money(amount_cents: i64, currency: &str) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    let whole = (abs / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{} {}{}.{:02}", currency, sign, grouped, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(125_000, "ETB"), "ETB 1,250.00");
        assert_eq!(format_money(5, "USD"), "USD 0.05");
        assert_eq!(format_money(123_456_789, "ETB"), "ETB 1,234,567.89");
        assert_eq!(format_money(-1_050, "ETB"), "ETB -10.50");
    }
}
