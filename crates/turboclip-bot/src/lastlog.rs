use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Lines kept for `/log`.
pub const LASTLOG_CAPACITY: usize = 25;

/// Ring buffer of the most recent formatted log lines.
#[derive(Clone)]
pub struct LastLog {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LastLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut lines) = self.lines.lock() {
            while lines.len() >= self.capacity {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.lines().join("\n")
    }
}

/// Buffers one formatted event and hands it to the ring on drop.
pub struct LastLogLine {
    buf: Vec<u8>,
    log: LastLog,
}

impl io::Write for LastLogLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LastLogLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.buf);
        for line in text.lines() {
            self.log.push(line.to_string());
        }
    }
}

impl<'a> MakeWriter<'a> for LastLog {
    type Writer = LastLogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LastLogLine {
            buf: Vec::new(),
            log: self.clone(),
        }
    }
}

/// Installs the global subscriber: stderr, the append-only log file (when it
/// can be opened) and the in-memory ring.
pub fn init(log_path: &Path, lastlog: &LastLog) {
    let file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => Some(Arc::new(f)),
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", log_path.display(), e);
            None
        }
    };
    let opened = file.is_some();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "turboclip=debug".into()),
        )
        .with(fmt::layer().with_writer(io::stderr))
        .with(file.map(|f| fmt::layer().with_ansi(false).with_writer(f)))
        .with(fmt::layer().with_ansi(false).with_target(false).with_writer(lastlog.clone()))
        .init();

    if !opened {
        warn!("Logging to {} disabled", log_path.display());
    }
}
