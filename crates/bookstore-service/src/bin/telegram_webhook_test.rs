//! 向 webhook 发送模拟的 Telegram 更新，用于本地联调机器人命令
//!
//! ```text
//! telegram-webhook-test http://localhost:8080/api/telegram/webhook --text "/books"
//! ```

use anyhow::{Context, bail};
use bookstore_service::telegram::types::{Chat, Message, Update, User};
use chrono::Utc;
use clap::Parser;

const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

#[derive(Debug, Parser)]
#[command(
    name = "telegram-webhook-test",
    version,
    about = "Send a fake Telegram update to the bookstore webhook"
)]
struct Args {
    /// Webhook URL
    url: String,

    /// Message text, e.g. "/start" or "/buy book <id>"
    #[arg(short, long, default_value = "/start")]
    text: String,

    /// Webhook secret token (sent as X-Telegram-Bot-Api-Secret-Token)
    #[arg(short, long)]
    secret: Option<String>,

    /// Chat id to simulate
    #[arg(short, long, default_value_t = 100_000_001)]
    chat_id: i64,

    /// Sender first name
    #[arg(long, default_value = "Tester")]
    first_name: String,
}

fn build_update(args: &Args) -> Update {
    let now = Utc::now().timestamp();
    Update {
        update_id: now,
        message: Some(Message {
            message_id: now % 1_000_000,
            date: now,
            chat: Chat {
                id: args.chat_id,
                kind: "private".to_string(),
                username: None,
                first_name: Some(args.first_name.clone()),
            },
            from: Some(User {
                id: args.chat_id,
                is_bot: false,
                first_name: args.first_name.clone(),
                last_name: None,
                username: None,
            }),
            text: Some(args.text.clone()),
        }),
        edited_message: None,
        callback_query: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let update = build_update(&args);

    let client = reqwest::Client::new();
    let mut request = client.post(&args.url).json(&update);
    if let Some(secret) = &args.secret {
        request = request.header(SECRET_HEADER, secret);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("failed to reach {}", args.url))?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    println!("{} {}", status, body);
    if !status.is_success() {
        bail!("webhook returned {}", status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_build_update_defaults() {
        let args = Args::parse_from(["telegram-webhook-test", "http://localhost/hook"]);
        let update = build_update(&args);
        let (chat_id, text) = update.actionable_text().unwrap();
        assert_eq!(chat_id, 100_000_001);
        assert_eq!(text, "/start");
    }
}
