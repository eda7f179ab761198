//! 机器人命令分发
//!
//! webhook 收到的每条更新都在这里解析并生成回复。业务错误转成提示文本回复给用户，
//! 系统错误记录日志后回复通用提示，保证 webhook 始终返回 200。

use std::sync::Arc;

use bookstore_shared::config::TelegramConfig;
use bookstore_shared::observability::metrics;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::client::TelegramApi;
use super::command::{Command, buy_payload};
use super::link::{self, LinkedProfile};
use super::types::Update;
use crate::error::{ApiError, Result};
use crate::models::{Book, ItemType, PurchaseStatus, RequestSource};
use crate::notification::{NotificationKind, NotificationService};
use crate::service::purchase_workflow::{self, NewPurchaseRequest};
use crate::service::{catalog, format_money, library, payment_config};

const BOOKS_LIMIT: i64 = 10;
const STATUS_LIMIT: i64 = 5;
const LIBRARY_LIMIT: i64 = 20;
/// Telegram 下单时的支付方式占位，提交凭证时会被实际方式覆盖
pub const TELEGRAM_PAYMENT_METHOD: &str = "manual";

const NOT_LINKED: &str = "Your Telegram account is not linked yet. \
    Open your account page on the website, tap \"Connect Telegram\" and follow the link.";
const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";

pub struct TelegramDispatcher {
    pool: PgPool,
    api: Option<Arc<dyn TelegramApi>>,
    notifier: Arc<NotificationService>,
    config: TelegramConfig,
}

/// 申请状态行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusLine {
    pub item_title: Option<String>,
    pub status: PurchaseStatus,
    pub amount_cents: i64,
    pub currency: String,
}

impl TelegramDispatcher {
    pub fn new(
        pool: PgPool,
        api: Option<Arc<dyn TelegramApi>>,
        notifier: Arc<NotificationService>,
        config: TelegramConfig,
    ) -> Self {
        Self {
            pool,
            api,
            notifier,
            config,
        }
    }

    /// 处理一条 webhook 更新，回复通过 Bot API 发送
    #[instrument(skip(self, update), fields(update_id = update.update_id))]
    pub async fn handle_update(&self, update: &Update) {
        let Some((chat_id, text)) = update.actionable_text() else {
            metrics::record_telegram_update("ignored");
            debug!("Ignoring non-text update");
            return;
        };

        let reply = match Command::parse(&text) {
            Some(command) => {
                metrics::record_telegram_update(command.metric_name());
                match self.execute(chat_id, command).await {
                    Ok(reply) => reply,
                    Err(e) => user_facing_error(&e),
                }
            }
            None => {
                metrics::record_telegram_update("text");
                "Send /help to see what I can do.".to_string()
            }
        };

        self.reply(chat_id, &reply).await;
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        let Some(api) = &self.api else {
            debug!(chat_id, "Telegram bot token not configured, reply dropped");
            return;
        };
        if let Err(e) = api.send_message(chat_id, text).await {
            warn!(chat_id, error = %e, "Failed to send Telegram reply");
        }
    }

    /// 执行命令并返回回复文本
    pub async fn execute(&self, chat_id: i64, command: Command) -> Result<String> {
        match command {
            Command::Start { payload } => {
                if let Some(payload) = payload {
                    debug!(payload = %payload, "Unrecognized start payload");
                }
                Ok(welcome_text(&self.config.bot_username))
            }
            Command::Help => Ok(help_text()),
            Command::Books => self.books().await,
            Command::Link { code } => self.link(chat_id, &code).await,
            Command::Buy { item_type, item_id } => self.buy(chat_id, item_type, item_id).await,
            Command::Status => self.status(chat_id).await,
            Command::Library => self.library(chat_id).await,
            Command::Usage(usage) => Ok(usage.to_string()),
            Command::Unknown(name) => Ok(format!("Unknown command /{}. Send /help for the list.", name)),
        }
    }

    async fn linked_profile(&self, chat_id: i64) -> Result<Option<LinkedProfile>> {
        link::find_by_chat(&self.pool, chat_id).await
    }

    async fn books(&self) -> Result<String> {
        let sql = format!(
            "SELECT {} FROM books WHERE published ORDER BY created_at DESC LIMIT $1",
            catalog::BOOK_COLUMNS
        );
        let books = sqlx::query_as::<_, Book>(&sql)
            .bind(BOOKS_LIMIT)
            .fetch_all(&self.pool)
            .await?;
        Ok(format_book_list(&books))
    }

    async fn link(&self, chat_id: i64, code: &str) -> Result<String> {
        match link::redeem_link_code(&self.pool, code, chat_id).await? {
            Some(profile) => {
                info!(chat_id, user_id = %profile.id, "Telegram chat linked");
                Ok(format!(
                    "Linked! Hi {}, you can now buy books here with /buy and follow them with /status.",
                    profile.name()
                ))
            }
            None => Ok(
                "That link code is invalid or has expired. Generate a new one from your account page."
                    .to_string(),
            ),
        }
    }

    async fn buy(&self, chat_id: i64, item_type: ItemType, item_id: Uuid) -> Result<String> {
        let Some(profile) = self.linked_profile(chat_id).await? else {
            return Ok(NOT_LINKED.to_string());
        };

        let created = purchase_workflow::create_request(
            &self.pool,
            NewPurchaseRequest {
                user_id: profile.id,
                item_type,
                item_id,
                payment_method: TELEGRAM_PAYMENT_METHOD.to_string(),
                source: RequestSource::Telegram,
                telegram_chat_id: Some(chat_id),
            },
        )
        .await?;

        self.notifier.spawn_notify_user(
            self.pool.clone(),
            profile.id,
            NotificationKind::RequestReceived,
            vec![
                ("item_title", created.item_title.clone()),
                (
                    "amount",
                    format_money(created.request.amount_cents, &created.request.currency),
                ),
                ("request_id", created.request.id.to_string()),
            ],
        );

        let config = payment_config::load_public_config(&self.pool).await?;
        let instructions = payment_config::payment_instructions(
            &config,
            &created.item_title,
            created.request.amount_cents,
            &created.request.currency,
        );
        Ok(format!("{}\n\nRequest ID: {}", instructions, created.request.id))
    }

    async fn status(&self, chat_id: i64) -> Result<String> {
        let Some(profile) = self.linked_profile(chat_id).await? else {
            return Ok(NOT_LINKED.to_string());
        };

        let lines = sqlx::query_as::<_, StatusLine>(
            r#"
            SELECT COALESCE(b.title, bd.title) AS item_title,
                   pr.status, pr.amount_cents, pr.currency
            FROM purchase_requests pr
            LEFT JOIN books b ON pr.item_type = 'book' AND b.id = pr.item_id
            LEFT JOIN bundles bd ON pr.item_type = 'bundle' AND bd.id = pr.item_id
            WHERE pr.user_id = $1
            ORDER BY pr.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(profile.id)
        .bind(STATUS_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(format_status_list(&lines))
    }

    async fn library(&self, chat_id: i64) -> Result<String> {
        let Some(profile) = self.linked_profile(chat_id).await? else {
            return Ok(NOT_LINKED.to_string());
        };

        let titles = library::titles(&self.pool, profile.id, LIBRARY_LIMIT).await?;
        if titles.is_empty() {
            return Ok("Your library is empty. Browse books with /books.".to_string());
        }

        let mut text = String::from("Your library:");
        for title in titles {
            text.push_str("\n- ");
            text.push_str(&title);
        }
        Ok(text)
    }
}

/// 业务错误转成用户可读的回复
fn user_facing_error(err: &ApiError) -> String {
    match err {
        ApiError::AlreadyOwned => "You already own this item. Check /library.".to_string(),
        ApiError::DuplicateRequest => {
            "You already have an open request for this item. Check /status.".to_string()
        }
        ApiError::BookNotFound(_) | ApiError::BundleNotFound(_) => {
            "That item is not available. Browse books with /books.".to_string()
        }
        other => {
            error!(error = %other, "Telegram command failed");
            GENERIC_FAILURE.to_string()
        }
    }
}

pub fn welcome_text(bot_username: &str) -> String {
    format!(
        "Welcome to the bookstore (@{})!\n\n{}",
        bot_username.trim_start_matches('@'),
        help_text()
    )
}

pub fn help_text() -> String {
    [
        "Commands:",
        "/books - latest books",
        "/buy <book|bundle> <id> - start a purchase",
        "/status - your recent purchase requests",
        "/library - books you own",
        "/link <code> - connect your website account",
        "/help - this message",
    ]
    .join("\n")
}

pub fn format_book_list(books: &[Book]) -> String {
    if books.is_empty() {
        return "No books are available right now.".to_string();
    }

    let mut text = String::from("Latest books:");
    for book in books {
        text.push_str(&format!(
            "\n\n{} by {}\n{}\n/start {}",
            book.title,
            book.author,
            format_money(book.price_cents, &book.currency),
            buy_payload(ItemType::Book, book.id)
        ));
    }
    text
}

pub fn format_status_list(lines: &[StatusLine]) -> String {
    if lines.is_empty() {
        return "You have no purchase requests yet. Browse books with /books.".to_string();
    }

    let mut text = String::from("Your recent requests:");
    for line in lines {
        text.push_str(&format!(
            "\n- {}: {} ({})",
            line.item_title.as_deref().unwrap_or("Unknown item"),
            line.status.label(),
            format_money(line.amount_cents, &line.currency)
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(title: &str, price_cents: i64) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: "Frank Herbert".to_string(),
            description: None,
            cover_url: None,
            file_key: "books/dune.pdf".to_string(),
            price_cents,
            currency: "ETB".to_string(),
            published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text();
        for cmd in ["/books", "/buy", "/status", "/library", "/link", "/help"] {
            assert!(help.contains(cmd), "missing {}", cmd);
        }
        assert!(welcome_text("@bookstore_bot").starts_with("Welcome to the bookstore (@bookstore_bot)"));
    }

    #[test]
    fn test_book_list_includes_buy_deep_link() {
        let dune = book("Dune", 45_000);
        let text = format_book_list(std::slice::from_ref(&dune));
        assert!(text.contains("Dune by Frank Herbert"));
        assert!(text.contains("ETB 450.00"));
        assert!(text.contains(&format!("/start buy_book_{}", dune.id)));

        // 回复中的 deep-link 能被重新解析为购买命令
        let line = text.lines().last().unwrap();
        assert_eq!(
            Command::parse(line),
            Some(Command::Buy {
                item_type: ItemType::Book,
                item_id: dune.id
            })
        );
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(format_book_list(&[]), "No books are available right now.");
        assert!(format_status_list(&[]).starts_with("You have no purchase requests"));
    }

    #[test]
    fn test_status_list_uses_labels() {
        let text = format_status_list(&[
            StatusLine {
                item_title: Some("Dune".into()),
                status: PurchaseStatus::AwaitingPayment,
                amount_cents: 45_000,
                currency: "ETB".into(),
            },
            StatusLine {
                item_title: None,
                status: PurchaseStatus::Approved,
                amount_cents: 100,
                currency: "ETB".into(),
            },
        ]);
        assert!(text.contains(&format!("- Dune: {} (ETB 450.00)", PurchaseStatus::AwaitingPayment.label())));
        assert!(text.contains("- Unknown item:"));
    }

    #[test]
    fn test_user_facing_errors() {
        assert!(user_facing_error(&ApiError::AlreadyOwned).contains("/library"));
        assert!(user_facing_error(&ApiError::DuplicateRequest).contains("/status"));
        assert!(user_facing_error(&ApiError::BookNotFound(Uuid::nil())).contains("/books"));
        assert_eq!(
            user_facing_error(&ApiError::Internal("boom".into())),
            GENERIC_FAILURE
        );
    }
}
