use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use turboclip_db::calendar::{GRID_ROW_WIDTH, month_grid};
use turboclip_db::rate_limit::RateLimiter;
use turboclip_db::{Database, call_blocking};
use turboclip_telegram::{BotApi, Deliverer, Payload, Transport, TransportError};
use turboclip_types::models::Month;
use turboclip_types::telegram::{CallbackQuery, Message, SendOptions, TgUser, Update};
use turboclip_types::zone::ViewerZone;

use crate::lastlog::LastLog;
use crate::render::{self, FILLER_DATA, MAX_MESSAGE_CHARS};
use crate::text::Texts;

/// Everything the bot needs from the Bot API beyond sending.
pub trait Api: Transport {
    fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> impl Future<Output = Result<Vec<Update>, TransportError>> + Send;

    fn answer_callback(&self, callback_query_id: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl Api for BotApi {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        BotApi::get_updates(self, offset, timeout_secs).await
    }

    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), TransportError> {
        self.answer_callback_query(callback_query_id).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stat,
    List,
    Log,
    LogFile,
    DbFile,
}

impl Command {
    /// Parses `/name` or `/name@botname` from the first word of `text`.
    fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(Self::Start),
            "stat" => Some(Self::Stat),
            "list" => Some(Self::List),
            "log" => Some(Self::Log),
            "logfile" => Some(Self::LogFile),
            "dbfile" => Some(Self::DbFile),
            _ => None,
        }
    }

    fn owner_only(self) -> bool {
        matches!(self, Self::List | Self::Log | Self::LogFile | Self::DbFile)
    }
}

pub struct Bot<A> {
    pub db: Arc<Database>,
    pub outbox: Deliverer<A>,
    pub texts: Texts,
    pub lastlog: LastLog,
    pub limiter: RateLimiter,
    pub owner_id: i64,
    pub tz: ViewerZone,
    pub started_at: DateTime<Utc>,
    pub log_path: PathBuf,
}

impl<A: Api> Bot<A> {
    /// Handles one update. An `Err` means the store failed; delivery
    /// failures are logged and swallowed.
    pub async fn handle_update(&self, update: Update) -> Result<()> {
        if let Some(message) = update.message {
            self.on_message(message).await
        } else if let Some(callback) = update.callback_query {
            self.on_callback(callback).await
        } else {
            Ok(())
        }
    }

    async fn on_message(&self, message: Message) -> Result<()> {
        let Some(sender) = message.from.clone() else {
            return Ok(());
        };
        let Some(text) = message.text.clone() else {
            return Ok(());
        };

        self.track_user(&sender).await?;

        let sent_at = DateTime::from_timestamp(message.date, 0);
        if sent_at.is_some_and(|sent_at| sent_at < self.started_at) {
            info!(
                "skip old message from [{:?}, {}]: {:?}",
                sender.username_or_empty(),
                sender.id,
                text
            );
            return Ok(());
        }

        match Command::parse(&text) {
            Some(cmd) if cmd.owner_only() && sender.id != self.owner_id => {
                self.say(&sender, "CommandNotFound", SendOptions::plain()).await;
                Ok(())
            }
            Some(Command::Start) => self.on_start(&sender).await,
            Some(Command::Stat) => self.on_stat(&sender).await,
            Some(Command::List) => self.on_list(&sender).await,
            Some(Command::Log) => self.on_log(&sender).await,
            Some(Command::LogFile) => self.on_logfile(&sender).await,
            Some(Command::DbFile) => self.on_dbfile(&sender).await,
            None => self.on_text(&sender, text).await,
        }
    }

    /// Registers first-time senders and keeps the stored name current.
    async fn track_user(&self, sender: &TgUser) -> Result<()> {
        let id = sender.id;
        let username = sender.username_or_empty().to_string();

        let created = call_blocking(self.db.clone(), move |db| {
            let (user, created) = db.add_or_find_user(id)?;
            if user.name != username {
                match db.apply_name(id, &username) {
                    Err(e) if e.is_not_found() => warn!("cannot rename user {}: {}", id, e),
                    other => other?,
                }
            }
            Ok(created)
        })
        .await?;

        if created {
            info!("added new user [{:?}, {}]", sender.username_or_empty(), id);
        }
        Ok(())
    }

    async fn on_start(&self, sender: &TgUser) -> Result<()> {
        info!("/start for user [{:?}, {}]", sender.username_or_empty(), sender.id);
        let text = self.texts.format("Start", &[&sender.first_name]);
        self.reply(sender, text, SendOptions::markdown()).await;
        Ok(())
    }

    async fn on_stat(&self, sender: &TgUser) -> Result<()> {
        info!("/stat for user [{:?}, {}]", sender.username_or_empty(), sender.id);
        let id = sender.id;
        let stat = call_blocking(self.db.clone(), move |db| db.stat(id)).await?;

        let uptime = render::format_uptime(Utc::now() - self.started_at);
        let text = self
            .texts
            .format("Stat", &[&stat.total, &stat.user_total, &uptime]);
        self.reply(sender, text, SendOptions::markdown()).await;
        Ok(())
    }

    async fn on_text(&self, sender: &TgUser, text: String) -> Result<()> {
        info!("text from user [{:?}, {}]", sender.username_or_empty(), sender.id);

        if text.starts_with('/') {
            self.say(sender, "CommandNotFound", SendOptions::plain()).await;
            return Ok(());
        }

        let id = sender.id;
        let limiter = self.limiter;
        let allowed =
            call_blocking(self.db.clone(), move |db| limiter.allow_new_highlight(db, id)).await?;
        if !allowed {
            info!("spam from [{:?}, {}]: {:?}", sender.username_or_empty(), id, text);
            self.say(sender, "Spam", SendOptions::plain()).await;
            return Ok(());
        }

        info!("new highlight from [{:?}, {}]: {:?}", sender.username_or_empty(), id, text);
        let body = text.clone();
        call_blocking(self.db.clone(), move |db| db.append_highlight(id, &body)).await?;

        let thanks = self.texts.format("Thanks", &[&sender.first_name]);
        self.reply_plain(sender, thanks).await;

        let note = self
            .texts
            .format("NewFrom", &[&sender.username_or_empty(), &id, &text]);
        self.outbox
            .notify(self.owner_id, Payload::Text(note), SendOptions::plain())
            .await;
        Ok(())
    }

    async fn on_list(&self, sender: &TgUser) -> Result<()> {
        info!("/list for user [{:?}, {}]", sender.username_or_empty(), sender.id);
        let now = Utc::now().with_timezone(&self.tz);
        let months = call_blocking(self.db.clone(), move |db| db.list_months(&now)).await?;

        if months.is_empty() {
            self.say(sender, "Nothing", SendOptions::markdown()).await;
            return Ok(());
        }

        let keyboard = render::month_keyboard(&month_grid(&months, GRID_ROW_WIDTH));
        self.say(sender, "ChooseMonth", SendOptions::markdown().with_keyboard(keyboard))
            .await;
        Ok(())
    }

    async fn on_callback(&self, callback: CallbackQuery) -> Result<()> {
        let sender = &callback.from;
        let data = callback.data.as_deref().unwrap_or("");
        info!(
            "callback for user [{:?}, {}]: {:?}",
            sender.username_or_empty(),
            sender.id,
            data
        );

        if let Err(e) = self.outbox.transport().answer_callback(&callback.id).await {
            warn!("cannot answer callback {}: {}", callback.id, e);
        }

        if sender.id != self.owner_id {
            self.say(sender, "CommandNotFound", SendOptions::plain()).await;
            return Ok(());
        }
        if data == FILLER_DATA {
            return Ok(());
        }

        let month: Month = match data.parse() {
            Ok(m) => m,
            Err(e) => {
                warn!("ignoring callback: {}", e);
                return Ok(());
            }
        };

        let tz = self.tz;
        let (highlights, names) = call_blocking(self.db.clone(), move |db| {
            let highlights = db.month_highlights(month, &tz)?;
            let mut ids: Vec<i64> = highlights.iter().map(|h| h.user_id).collect();
            ids.sort_unstable();
            ids.dedup();
            let names = db.user_names(&ids)?;
            Ok((highlights, names))
        })
        .await?;

        if highlights.is_empty() {
            self.say(sender, "Nothing", SendOptions::markdown()).await;
            return Ok(());
        }

        let listing = render::month_listing(month, &highlights, &names, &self.tz);
        for chunk in render::split_message(&listing, MAX_MESSAGE_CHARS) {
            self.reply(sender, chunk, SendOptions::markdown()).await;
        }
        Ok(())
    }

    async fn on_log(&self, sender: &TgUser) -> Result<()> {
        let text = format!("```\n{}\n```", self.lastlog.text());
        self.reply(sender, text, SendOptions::markdown()).await;
        Ok(())
    }

    async fn on_logfile(&self, sender: &TgUser) -> Result<()> {
        info!("/logfile");
        let name = file_name_or(&self.log_path, "log.txt");
        self.send_document(sender, Payload::document(self.log_path.clone(), name))
            .await;
        Ok(())
    }

    async fn on_dbfile(&self, sender: &TgUser) -> Result<()> {
        info!("/dbfile");
        let path = self.db.path().to_path_buf();
        let name = file_name_or(&path, "bot.db");
        self.send_document(sender, Payload::document(path, name)).await;
        Ok(())
    }

    async fn reply(&self, to: &TgUser, text: String, options: SendOptions) {
        self.outbox.notify(to.id, Payload::Text(text), options).await;
    }

    /// Sends the argument-free template `key`.
    async fn say(&self, to: &TgUser, key: &str, options: SendOptions) {
        let text = self.texts.format(key, &[]);
        self.reply(to, text, options).await;
    }

    async fn reply_plain(&self, to: &TgUser, text: String) {
        self.reply(to, text, SendOptions::plain()).await;
    }

    async fn send_document(&self, to: &TgUser, payload: Payload) {
        self.outbox.notify(to.id, payload, SendOptions::plain()).await;
    }
}

fn file_name_or(path: &std::path::Path, fallback: &str) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}
