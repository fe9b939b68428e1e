use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::StorageErrorPolicy;
use crate::handlers::{Api, Bot};

/// Long-poll timeout handed to `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 10;

/// Pause after a failed `getUpdates` call.
const POLL_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Fetches updates until `shutdown` resolves, handling each one on its own
/// task. Returns an error only when a handler failed on the store and the
/// policy is [`StorageErrorPolicy::Halt`].
pub async fn run<A, S>(bot: Arc<Bot<A>>, policy: StorageErrorPolicy, shutdown: S) -> Result<()>
where
    A: Api + 'static,
    S: Future<Output = ()>,
{
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<anyhow::Error>(1);
    let mut offset = 0;
    tokio::pin!(shutdown);

    info!("Polling for updates");

    loop {
        let polled = tokio::select! {
            _ = &mut shutdown => {
                info!("Poller stopped");
                return Ok(());
            }
            Some(err) = fatal_rx.recv() => {
                return Err(err);
            }
            polled = bot.outbox.transport().get_updates(offset, POLL_TIMEOUT_SECS) => polled,
        };

        let updates = match polled {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {}", e);
                tokio::time::sleep(POLL_RETRY_PAUSE).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            debug!(update_id = update.update_id, "dispatching update");

            let bot = bot.clone();
            let fatal = fatal_tx.clone();
            tokio::spawn(async move {
                let update_id = update.update_id;
                let Err(e) = bot.handle_update(update).await else {
                    return;
                };
                match policy {
                    StorageErrorPolicy::Halt => {
                        error!("update {} failed on the store, halting: {:#}", update_id, e);
                        let _ = fatal
                            .send(anyhow!("storage failure on update {}: {:#}", update_id, e))
                            .await;
                    }
                    StorageErrorPolicy::Continue => {
                        error!("update {} dropped after storage failure: {:#}", update_id, e);
                    }
                }
            });
        }
    }
}
