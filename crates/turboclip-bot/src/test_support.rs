//! Fixtures shared by the handler and poller tests.

use std::collections::VecDeque;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{FixedOffset, TimeDelta, Utc};
use turboclip_db::Database;
use turboclip_db::rate_limit::RateLimiter;
use turboclip_telegram::{Deliverer, Payload, RetryConfig, Transport, TransportError};
use turboclip_types::telegram::{CallbackQuery, Chat, Message, SendOptions, TgUser, Update};
use turboclip_types::zone::ViewerZone;

use crate::handlers::{Api, Bot};
use crate::lastlog::LastLog;
use crate::text::Texts;

pub const OWNER: i64 = 1;
pub const GUEST: i64 = 2;

/// Records everything sent and replays scripted update batches. Once the
/// script is empty `get_updates` idles briefly and returns nothing.
#[derive(Default)]
pub struct RecordingApi {
    pub sent: Mutex<Vec<(i64, Payload, SendOptions)>>,
    pub answered: Mutex<Vec<String>>,
    pub batches: Mutex<VecDeque<Result<Vec<Update>, TransportError>>>,
    pub offsets: Mutex<Vec<i64>>,
}

impl Transport for RecordingApi {
    async fn send(
        &self,
        chat_id: i64,
        payload: &Payload,
        options: &SendOptions,
    ) -> Result<Message, TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id, payload.clone(), options.clone()));
        Ok(Message {
            message_id: 1,
            from: None,
            chat: Chat { id: chat_id },
            date: 0,
            text: None,
        })
    }
}

impl Api for RecordingApi {
    async fn get_updates(&self, offset: i64, _timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), TransportError> {
        self.answered.lock().unwrap().push(callback_query_id.to_string());
        Ok(())
    }
}

/// A bot on a fresh database file, removed on drop.
pub struct Harness {
    pub bot: Arc<Bot<RecordingApi>>,
    path: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("turboclip_bot_{}.db", uuid::Uuid::new_v4()));
        let db = Arc::new(Database::open(&path).unwrap());
        let bot = Bot {
            db,
            outbox: Deliverer::new(RecordingApi::default(), RetryConfig::DEFAULT),
            texts: Texts::bundled().unwrap(),
            lastlog: LastLog::new(5),
            limiter: RateLimiter::default(),
            owner_id: OWNER,
            tz: ViewerZone::Fixed(FixedOffset::east_opt(0).unwrap()),
            started_at: Utc::now() - TimeDelta::minutes(1),
            log_path: PathBuf::from("log.txt"),
        };
        Self {
            bot: Arc::new(bot),
            path,
        }
    }

    pub fn api(&self) -> &RecordingApi {
        self.bot.outbox.transport()
    }

    pub fn sent(&self) -> Vec<(i64, Payload, SendOptions)> {
        self.api().sent.lock().unwrap().clone()
    }

    pub fn sent_texts_to(&self, chat: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _, _)| *to == chat)
            .filter_map(|(_, p, _)| match p {
                Payload::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self, key: &str, args: &[&dyn Display]) -> String {
        self.bot.texts.format(key, args)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}

pub fn user(id: i64, username: &str) -> TgUser {
    TgUser {
        id,
        is_bot: false,
        first_name: format!("First{}", id),
        username: Some(username.to_string()),
    }
}

pub fn message_from(from: TgUser, text: &str) -> Update {
    Update {
        update_id: 1,
        message: Some(Message {
            message_id: 10,
            chat: Chat { id: from.id },
            from: Some(from),
            date: Utc::now().timestamp(),
            text: Some(text.to_string()),
        }),
        callback_query: None,
    }
}

pub fn callback_from(from: TgUser, data: &str) -> Update {
    Update {
        update_id: 2,
        message: None,
        callback_query: Some(CallbackQuery {
            id: "cb-1".into(),
            from,
            message: None,
            data: Some(data.to_string()),
        }),
    }
}
