//! 收款配置读取

use std::time::Duration;

use bookstore_shared::cache::{Cache, CacheKey};
use sqlx::PgPool;
use tracing::warn;

use super::format_money;
use crate::dto::{PaymentMethodDto, PublicPaymentConfigDto, WalletDto};
use crate::error::Result;
use crate::models::{PaymentMethodConfig, WalletConfig};

const CACHE_TTL: Duration = Duration::from_secs(60);

/// 已启用的收款方式与钱包，按 sort_order 排序
pub async fn load_public_config(pool: &PgPool) -> Result<PublicPaymentConfigDto> {
    let methods = sqlx::query_as::<_, PaymentMethodConfig>(
        r#"
        SELECT id, method_code, display_name, account_name, account_number, instructions,
               enabled, sort_order, created_at, updated_at
        FROM payment_config
        WHERE enabled
        ORDER BY sort_order, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let wallets = sqlx::query_as::<_, WalletConfig>(
        r#"
        SELECT id, network, address, label, enabled, created_at, updated_at
        FROM wallet_config
        WHERE enabled
        ORDER BY network, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(PublicPaymentConfigDto {
        methods: methods.into_iter().map(PaymentMethodDto::from).collect(),
        wallets: wallets.into_iter().map(WalletDto::from).collect(),
    })
}

/// 带缓存读取；Redis 不可用时直接查库
pub async fn load_public_config_cached(pool: &PgPool, cache: &Cache) -> Result<PublicPaymentConfigDto> {
    let key = CacheKey::payment_config();
    match cache.get::<PublicPaymentConfigDto>(&key).await {
        Ok(Some(config)) => return Ok(config),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Payment config cache read failed"),
    }

    let config = load_public_config(pool).await?;
    if let Err(e) = cache.set(&key, &config, CACHE_TTL).await {
        warn!(error = %e, "Payment config cache write failed");
    }
    Ok(config)
}

/// 生成发给用户的付款说明文本
pub fn payment_instructions(
    config: &PublicPaymentConfigDto,
    item_title: &str,
    amount_cents: i64,
    currency: &str,
) -> String {
    let mut lines = vec![format!(
        "To buy \"{}\", send {} using one of these methods:",
        item_title,
        format_money(amount_cents, currency)
    )];

    for method in &config.methods {
        lines.push(String::new());
        lines.push(method.display_name.clone());
        lines.push(format!("  Account name: {}", method.account_name));
        lines.push(format!("  Account number: {}", method.account_number));
        if let Some(instructions) = method.instructions.as_deref().filter(|s| !s.is_empty()) {
            lines.push(format!("  {}", instructions));
        }
    }

    for wallet in &config.wallets {
        lines.push(String::new());
        match wallet.label.as_deref() {
            Some(label) => lines.push(format!("{} ({})", wallet.network, label)),
            None => lines.push(wallet.network.clone()),
        }
        lines.push(format!("  Address: {}", wallet.address));
    }

    if config.methods.is_empty() && config.wallets.is_empty() {
        lines.push("No payment methods are configured yet. An admin will contact you.".to_string());
    }

    lines.push(String::new());
    lines.push("After paying, upload your payment screenshot on the website.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PublicPaymentConfigDto {
        PublicPaymentConfigDto {
            methods: vec![PaymentMethodDto {
                id: 1,
                method_code: "cbe".into(),
                display_name: "Commercial Bank of Ethiopia".into(),
                account_name: "Bookstore PLC".into(),
                account_number: "1000123456789".into(),
                instructions: Some("Use your email as the reason".into()),
                enabled: true,
                sort_order: 0,
            }],
            wallets: vec![WalletDto {
                id: 1,
                network: "USDT-TRC20".into(),
                address: "TXabc123".into(),
                label: None,
                enabled: true,
            }],
        }
    }

    #[test]
    fn test_instructions_list_methods_and_wallets() {
        let text = payment_instructions(&config(), "Dune", 45_000, "ETB");
        assert!(text.starts_with("To buy \"Dune\", send ETB 450.00"));
        assert!(text.contains("Account number: 1000123456789"));
        assert!(text.contains("Use your email as the reason"));
        assert!(text.contains("Address: TXabc123"));
        assert!(!text.contains("No payment methods"));
    }

    #[test]
    fn test_instructions_without_methods() {
        let empty = PublicPaymentConfigDto {
            methods: vec![],
            wallets: vec![],
        };
        let text = payment_instructions(&empty, "Dune", 100, "ETB");
        assert!(text.contains("No payment methods are configured yet"));
    }
}
