use serde::{Deserialize, Serialize};

/// Subset of the Telegram Bot API object model that the bot reads or writes.
/// Unknown fields are ignored on the way in.

// -- Envelope --

#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
}

// -- Inbound --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

impl TgUser {
    /// Username if set, otherwise an empty string.
    pub fn username_or_empty(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: Chat,
    /// Unix seconds.
    pub date: i64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: TgUser,
}

// -- Outbound --

/// Rich-text mode for outgoing text. `None` sends plain text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    #[default]
    #[serde(skip)]
    None,
    Markdown,
    MarkdownV2,
    #[serde(rename = "HTML")]
    Html,
}

impl ParseMode {
    pub fn is_plain(&self) -> bool {
        matches!(self, ParseMode::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// Per-send options. Mutated in place by the delivery engine when it falls
/// back to plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub parse_mode: ParseMode,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl SendOptions {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn markdown() -> Self {
        Self {
            parse_mode: ParseMode::Markdown,
            reply_markup: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.reply_markup = Some(keyboard);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "ParseMode::is_plain")]
    pub parse_mode: ParseMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub struct GetUpdatesRequest {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct AnswerCallbackQueryRequest<'a> {
    pub callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GetChatMemberRequest {
    pub chat_id: i64,
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_is_omitted_from_requests() {
        let req = SendMessageRequest {
            chat_id: 7,
            text: "hi",
            parse_mode: ParseMode::None,
            reply_markup: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({ "chat_id": 7, "text": "hi" }));
    }

    #[test]
    fn markdown_mode_and_keyboard_serialize() {
        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "11.23".into(),
                callback_data: "11.2023".into(),
            }]],
        };
        let req = SendMessageRequest {
            chat_id: 7,
            text: "*hi*",
            parse_mode: ParseMode::Markdown,
            reply_markup: Some(&keyboard),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["parse_mode"], "Markdown");
        assert_eq!(json["reply_markup"]["inline_keyboard"][0][0]["callback_data"], "11.2023");
    }

    #[test]
    fn update_with_callback_deserializes() {
        let raw = r#"{
            "update_id": 42,
            "callback_query": {
                "id": "abc",
                "from": { "id": 1, "is_bot": false, "first_name": "Ann", "username": "ann" },
                "message": { "message_id": 5, "chat": { "id": 1 }, "date": 1700000000 },
                "data": "11.2023"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert!(update.message.is_none());
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.from.username_or_empty(), "ann");
        assert_eq!(cb.data.as_deref(), Some("11.2023"));
    }

    #[test]
    fn error_envelope_deserializes() {
        let raw = r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities"}"#;
        let resp: ApiResponse<Message> = serde_json::from_str(raw).unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error_code, Some(400));
        assert!(resp.result.is_none());
    }
}
