//! 机器人命令解析
//!
//! 支持 `/cmd@bot_name` 形式；`/start` 的 deep-link payload 会被展开为对应命令：
//! - `link_<code>` → [`Command::Link`]
//! - `buy_<book|bundle>_<uuid>` → [`Command::Buy`]

use uuid::Uuid;

use crate::models::ItemType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { payload: Option<String> },
    Help,
    Books,
    Buy { item_type: ItemType, item_id: Uuid },
    Status,
    Library,
    Link { code: String },
    /// 命令存在但参数不合法，携带用法提示
    Usage(&'static str),
    Unknown(String),
}

pub const BUY_USAGE: &str = "Usage: /buy <book|bundle> <id>";
pub const LINK_USAGE: &str = "Usage: /link <code>. Generate a code from your account page.";

impl Command {
    /// 解析消息文本；非命令文本返回 `None`
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;

        let mut parts = body.split_whitespace();
        let head = parts.next()?;
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        let command = match name.as_str() {
            "start" => match args.first() {
                Some(payload) => Self::from_deep_link(payload),
                None => Command::Start { payload: None },
            },
            "help" => Command::Help,
            "books" => Command::Books,
            "status" => Command::Status,
            "library" => Command::Library,
            "buy" => match args.as_slice() {
                [kind, id] => match (kind.parse::<ItemType>(), Uuid::parse_str(id)) {
                    (Ok(item_type), Ok(item_id)) => Command::Buy { item_type, item_id },
                    _ => Command::Usage(BUY_USAGE),
                },
                _ => Command::Usage(BUY_USAGE),
            },
            "link" => match args.as_slice() {
                [code] if is_link_code_shape(code) => Command::Link {
                    code: code.to_ascii_uppercase(),
                },
                _ => Command::Usage(LINK_USAGE),
            },
            other => Command::Unknown(other.to_string()),
        };

        Some(command)
    }

    /// 展开 `/start` 的 payload
    fn from_deep_link(payload: &str) -> Command {
        if let Some(code) = payload.strip_prefix("link_") {
            if is_link_code_shape(code) {
                return Command::Link {
                    code: code.to_ascii_uppercase(),
                };
            }
        }

        if let Some(rest) = payload.strip_prefix("buy_") {
            if let Some((kind, id)) = rest.split_once('_') {
                if let (Ok(item_type), Ok(item_id)) = (kind.parse::<ItemType>(), Uuid::parse_str(id))
                {
                    return Command::Buy { item_type, item_id };
                }
            }
        }

        Command::Start {
            payload: Some(payload.to_string()),
        }
    }

    /// 指标标签
    pub fn metric_name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Help => "help",
            Command::Books => "books",
            Command::Buy { .. } => "buy",
            Command::Status => "status",
            Command::Library => "library",
            Command::Link { .. } => "link",
            Command::Usage(_) => "usage",
            Command::Unknown(_) => "unknown",
        }
    }
}

/// 构造购买 deep-link payload：`buy_<type>_<uuid>`
pub fn buy_payload(item_type: ItemType, item_id: Uuid) -> String {
    format!("buy_{}_{}", item_type.as_str(), item_id)
}

fn is_link_code_shape(code: &str) -> bool {
    (4..=16).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric())
}
