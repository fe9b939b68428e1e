mod config;
mod handlers;
mod lastlog;
mod poller;
mod render;
mod text;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use tracing::{error, info};

use turboclip_db::Database;
use turboclip_db::rate_limit::RateLimiter;
use turboclip_telegram::{BotApi, Deliverer, RetryConfig};

use crate::config::Config;
use crate::handlers::Bot;
use crate::lastlog::{LASTLOG_CAPACITY, LastLog};
use crate::text::Texts;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let lastlog = LastLog::new(LASTLOG_CAPACITY);
    lastlog::init(&cfg.log_path, &lastlog);

    let started_at = Utc::now();
    info!("Starting turboclip {}", env!("CARGO_PKG_VERSION"));
    info!("Time zone {}, storage errors: {:?}", cfg.tz, cfg.on_storage_error);

    let texts = Texts::load(&cfg.messages_path)?;
    let db = Arc::new(
        Database::open(&cfg.db_path)
            .with_context(|| format!("cannot open database {}", cfg.db_path.display()))?,
    );

    let api = BotApi::new(&cfg.api_url, &cfg.bot_token)?;
    let owner = api
        .get_chat_member(cfg.owner_id, cfg.owner_id)
        .await
        .with_context(|| format!("cannot find owner {}", cfg.owner_id))?;
    if owner.user.is_bot {
        bail!("owner {} is a bot", cfg.owner_id);
    }
    info!(
        "Owner is [{:?}, {}] ({})",
        owner.user.username_or_empty(),
        owner.user.id,
        owner.status
    );

    let retry = RetryConfig::DEFAULT.with_max_backoff(cfg.max_backoff);
    let bot = Arc::new(Bot {
        db,
        outbox: Deliverer::new(api, retry),
        texts,
        lastlog,
        limiter: RateLimiter::default(),
        owner_id: cfg.owner_id,
        tz: cfg.tz,
        started_at,
        log_path: cfg.log_path.clone(),
    });

    let result = poller::run(bot, cfg.on_storage_error, shutdown_signal()).await;
    if let Err(e) = &result {
        error!("Stopping: {:#}", e);
    }
    info!("Bye");
    result
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Cannot install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
