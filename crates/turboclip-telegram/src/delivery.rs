//! Outbound delivery with bounded retries.
//!
//! Every reply the bot produces goes through [`Deliverer::send`]. A failed
//! attempt is logged and retried after a growing pause. If the API rejects
//! rich text as malformed, the options are switched to plain text once and
//! the retries go out unformatted. After the last attempt the caller gets
//! [`DeliveryError::Exhausted`]; nothing panics.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use turboclip_types::telegram::{Message, ParseMode, SendOptions};

use crate::client::BotApi;
use crate::error::{DeliveryError, TransportError};

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    /// A local file uploaded as a document named `file_name`.
    Document { path: PathBuf, file_name: String },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    pub fn document(path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Payload::Document {
            path: path.into(),
            file_name: file_name.into(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => write!(f, "{:?}", text),
            Payload::Document { path, file_name } => {
                write!(f, "document {:?} ({})", file_name, path.display())
            }
        }
    }
}

/// The seam between the retry loop and the wire.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        chat_id: i64,
        payload: &Payload,
        options: &SendOptions,
    ) -> impl Future<Output = Result<Message, TransportError>> + Send;
}

impl Transport for BotApi {
    async fn send(
        &self,
        chat_id: i64,
        payload: &Payload,
        options: &SendOptions,
    ) -> Result<Message, TransportError> {
        match payload {
            Payload::Text(text) => self.send_message(chat_id, text, options).await,
            Payload::Document { path, file_name } => {
                self.send_document(chat_id, path, file_name).await
            }
        }
    }
}

/// Retry schedule for outbound sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Pause after the first failed attempt.
    pub initial_backoff: Duration,

    /// Factor applied to the pause after every failed attempt.
    pub multiplier: u32,

    /// Upper bound for a single pause. `None` lets the pause grow without
    /// limit (10 attempts at x3 ends with a pause of about a minute).
    pub max_backoff: Option<Duration>,
}

impl RetryConfig {
    /// 10 attempts, pauses of 10 ms, 30 ms, 90 ms, ...
    pub const DEFAULT: Self = Self {
        max_attempts: 10,
        initial_backoff: Duration::from_millis(10),
        multiplier: 3,
        max_backoff: None,
    };

    pub fn with_max_backoff(mut self, cap: Option<Duration>) -> Self {
        self.max_backoff = cap;
        self
    }

    fn clamp(&self, delay: Duration) -> Duration {
        match self.max_backoff {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    fn first_backoff(&self) -> Duration {
        self.clamp(self.initial_backoff)
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        self.clamp(current.saturating_mul(self.multiplier))
    }

    /// The pauses a send that never succeeds goes through, in order.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut delay = self.first_backoff();
        for _ in 1..self.max_attempts.max(1) {
            delays.push(delay);
            delay = self.next_backoff(delay);
        }
        delays
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sends payloads through a [`Transport`], retrying per [`RetryConfig`].
///
/// Holds no per-send state, so one instance can be shared by any number of
/// concurrent sends.
pub struct Deliverer<T> {
    transport: T,
    config: RetryConfig,
}

impl<T: Transport> Deliverer<T> {
    pub fn new(transport: T, config: RetryConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Sends `payload` to `chat_id`.
    ///
    /// `options` may be rewritten to plain text if the API rejects the
    /// formatting; the caller sees the mode that was used last.
    pub async fn send(
        &self,
        chat_id: i64,
        payload: &Payload,
        options: &mut SendOptions,
    ) -> Result<Message, DeliveryError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.first_backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.transport.send(chat_id, payload, options).await {
                Ok(message) => {
                    if attempt > 1 {
                        debug!(chat_id, attempt, "delivered after retry");
                    }
                    return Ok(message);
                }
                Err(e) => e,
            };

            warn!(
                chat_id,
                attempt,
                error = %err,
                "send failed: {}",
                payload,
            );

            if attempt >= max_attempts {
                warn!("can't send {} to {}", payload, chat_id);
                return Err(DeliveryError::Exhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }

            if err.is_format_rejection() && !options.parse_mode.is_plain() {
                warn!("retrying {} as plain text", payload);
                options.parse_mode = ParseMode::None;
            }

            tokio::time::sleep(backoff).await;
            backoff = self.config.next_backoff(backoff);
        }
    }

    /// Sends and swallows exhaustion (it is already logged). For replies
    /// whose loss does not affect the operation that produced them.
    pub async fn notify(&self, chat_id: i64, payload: Payload, mut options: SendOptions) -> Option<Message> {
        self.send(chat_id, &payload, &mut options).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;
    use turboclip_types::telegram::Chat;

    /// Records every attempt and replays scripted outcomes; once the script
    /// runs out every call fails with a server error.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<(), TransportError>>>,
        calls: Mutex<Vec<(Instant, ParseMode)>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<(), TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn modes(&self) -> Vec<ParseMode> {
            self.calls.lock().unwrap().iter().map(|(_, m)| *m).collect()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1].0 - w[0].0).collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            chat_id: i64,
            _payload: &Payload,
            options: &SendOptions,
        ) -> Result<Message, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((Instant::now(), options.parse_mode));
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(server_error()));
            next.map(|()| Message {
                message_id: 1,
                from: None,
                chat: Chat { id: chat_id },
                date: 0,
                text: None,
            })
        }
    }

    fn bad_markdown() -> TransportError {
        TransportError::Api {
            code: 400,
            description: "Bad Request: can't parse entities".into(),
        }
    }

    fn server_error() -> TransportError {
        TransportError::Api {
            code: 502,
            description: "Bad Gateway".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn format_rejection_downgrades_once_then_succeeds() {
        let deliverer = Deliverer::new(
            ScriptedTransport::new(vec![Err(bad_markdown()), Ok(())]),
            RetryConfig::DEFAULT,
        );
        let mut options = SendOptions::markdown();

        let sent = deliverer
            .send(42, &Payload::text("*broken_markdown"), &mut options)
            .await
            .unwrap();

        assert_eq!(sent.chat.id, 42);
        assert_eq!(options.parse_mode, ParseMode::None);
        assert_eq!(
            deliverer.transport().modes(),
            vec![ParseMode::Markdown, ParseMode::None]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn plain_text_rejection_is_plain_retry() {
        let deliverer = Deliverer::new(
            ScriptedTransport::new(vec![Err(bad_markdown()), Err(bad_markdown()), Ok(())]),
            RetryConfig::DEFAULT,
        );
        let mut options = SendOptions::plain();

        deliverer
            .send(1, &Payload::text("hello"), &mut options)
            .await
            .unwrap();

        assert_eq!(deliverer.transport().modes(), vec![ParseMode::None; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_keep_formatting() {
        let deliverer = Deliverer::new(
            ScriptedTransport::new(vec![Err(server_error()), Ok(())]),
            RetryConfig::DEFAULT,
        );
        let mut options = SendOptions::markdown();

        deliverer
            .send(1, &Payload::text("*ok*"), &mut options)
            .await
            .unwrap();

        assert_eq!(options.parse_mode, ParseMode::Markdown);
        assert_eq!(
            deliverer.transport().modes(),
            vec![ParseMode::Markdown, ParseMode::Markdown]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_transport_is_exhausted_after_ten_attempts() {
        let deliverer = Deliverer::new(ScriptedTransport::new(vec![]), RetryConfig::DEFAULT);
        let mut options = SendOptions::plain();

        let err = deliverer
            .send(1, &Payload::text("lost"), &mut options)
            .await
            .unwrap_err();

        let DeliveryError::Exhausted { attempts, last_error } = err;
        assert_eq!(attempts, 10);
        assert!(!last_error.is_format_rejection());

        let gaps = deliverer.transport().gaps();
        assert_eq!(gaps.len(), 9);
        let mut expected = Duration::from_millis(10);
        for gap in gaps {
            assert!(
                gap >= expected && gap < expected + Duration::from_millis(2),
                "gap {:?}, expected {:?}",
                gap,
                expected
            );
            expected *= 3;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn notify_swallows_exhaustion() {
        let config = RetryConfig {
            max_attempts: 2,
            ..RetryConfig::DEFAULT
        };
        let deliverer = Deliverer::new(ScriptedTransport::new(vec![]), config);
        let sent = deliverer
            .notify(1, Payload::text("gone"), SendOptions::plain())
            .await;
        assert!(sent.is_none());
        assert_eq!(deliverer.transport().modes().len(), 2);
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn lines(&self) -> Vec<String> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).lines().map(str::to_string).collect()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_failed_attempt_is_logged_with_payload_and_recipient() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let deliverer = Deliverer::new(
            ScriptedTransport::new(vec![Err(server_error()), Err(bad_markdown()), Ok(())]),
            RetryConfig::DEFAULT,
        );
        deliverer
            .send(77, &Payload::text("clip this"), &mut SendOptions::markdown())
            .await
            .unwrap();

        let failures: Vec<String> = log
            .lines()
            .into_iter()
            .filter(|l| l.contains("send failed"))
            .collect();
        assert_eq!(failures.len(), 2, "{:#?}", log.lines());
        for line in &failures {
            assert!(line.contains("\"clip this\""), "{}", line);
            assert!(line.contains("chat_id=77"), "{}", line);
        }
        assert!(failures[0].contains("attempt=1") && failures[0].contains("Bad Gateway"));
        assert!(failures[1].contains("attempt=2") && failures[1].contains("can't parse entities"));
        assert!(log.lines().iter().any(|l| l.contains("retrying \"clip this\" as plain text")));
    }

    #[test]
    fn default_schedule_is_uncapped_times_three() {
        let schedule = RetryConfig::DEFAULT.backoff_schedule();
        assert_eq!(schedule.len(), 9);
        assert_eq!(schedule[0], Duration::from_millis(10));
        assert_eq!(schedule[1], Duration::from_millis(30));
        assert_eq!(schedule[2], Duration::from_millis(90));
        assert_eq!(schedule[8], Duration::from_millis(65_610));
    }

    #[test]
    fn cap_limits_each_pause() {
        let config = RetryConfig::DEFAULT.with_max_backoff(Some(Duration::from_secs(1)));
        let schedule = config.backoff_schedule();
        assert_eq!(schedule[6], Duration::from_secs(1));
        assert!(schedule.iter().all(|d| *d <= Duration::from_secs(1)));
    }

    #[test]
    fn payload_display_names_documents() {
        let doc = Payload::document("/var/lib/bot.db", "bot.db");
        assert_eq!(doc.to_string(), "document \"bot.db\" (/var/lib/bot.db)");
        assert_eq!(Payload::text("hi").to_string(), "\"hi\"");
    }
}
