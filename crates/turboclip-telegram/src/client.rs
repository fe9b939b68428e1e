use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use turboclip_types::telegram::{
    AnswerCallbackQueryRequest, ApiResponse, ChatMember, GetChatMemberRequest, GetUpdatesRequest,
    Message, SendMessageRequest, SendOptions, Update,
};

use crate::error::TransportError;

/// Must outlive the long-poll timeout handed to `getUpdates`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Thin client for the Telegram Bot HTTP API.
#[derive(Clone)]
pub struct BotApi {
    http: Client,
    /// `{api_url}/bot{token}`
    base: String,
}

impl BotApi {
    pub fn new(api_url: &str, token: &str) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    async fn call<Req, T>(&self, method: &str, req: &Req) -> Result<T, TransportError>
    where
        Req: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        trace!(method, "bot api call");
        let resp = self.http.post(self.url(method)).json(req).send().await?;
        read_response(resp).await
    }

    /// Long-polls for updates with `update_id >= offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        let req = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message", "callback_query"],
        };
        self.call("getUpdates", &req).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: &SendOptions,
    ) -> Result<Message, TransportError> {
        let req = SendMessageRequest {
            chat_id,
            text,
            parse_mode: options.parse_mode,
            reply_markup: options.reply_markup.as_ref(),
        };
        self.call("sendMessage", &req).await
    }

    /// Uploads a local file as a document.
    pub async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
    ) -> Result<Message, TransportError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| TransportError::Attachment {
                path: path.to_path_buf(),
                source,
            })?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", Part::bytes(bytes).file_name(file_name.to_string()));

        let resp = self
            .http
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        read_response(resp).await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<bool, TransportError> {
        self.call(
            "answerCallbackQuery",
            &AnswerCallbackQueryRequest { callback_query_id },
        )
        .await
    }

    pub async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember, TransportError> {
        self.call("getChatMember", &GetChatMemberRequest { chat_id, user_id })
            .await
    }
}

/// The API replies with a JSON envelope for errors too (400, 403, 429...),
/// so the body is decoded regardless of the HTTP status.
async fn read_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, TransportError> {
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    let envelope: ApiResponse<T> =
        serde_json::from_str(&body).map_err(|e| TransportError::Malformed {
            status,
            detail: e.to_string(),
        })?;
    unwrap_envelope(envelope, status)
}

fn unwrap_envelope<T>(envelope: ApiResponse<T>, status: u16) -> Result<T, TransportError> {
    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { ok: true, .. } => Err(TransportError::Malformed {
            status,
            detail: "ok response without result".into(),
        }),
        ApiResponse {
            error_code,
            description,
            ..
        } => Err(TransportError::Api {
            code: error_code.unwrap_or(i64::from(status)),
            description: description.unwrap_or_default(),
        }),
    }
}
