pub mod calendar;
pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod rate_limit;

#[cfg(test)]
pub(crate) mod test_utils;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::info;

pub use error::{Result, StoreError};

const READER_POOL_SIZE: usize = 4;

/// Database files currently held open by this process.
static OPEN_PATHS: LazyLock<Mutex<HashSet<PathBuf>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Highlight store: one writer connection for every mutation and a small pool
/// of read-only connections for queries. The file is released on drop.
pub struct Database {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    ///
    /// Fails with [`StoreError::AlreadyOpen`] if this process already holds
    /// the same file open.
    pub fn open(path: &Path) -> Result<Self> {
        let writer = Connection::open(path)?;
        let path = path.canonicalize()?;

        {
            let mut open = OPEN_PATHS.lock().map_err(|_| StoreError::LockPoisoned)?;
            if !open.insert(path.clone()) {
                return Err(StoreError::AlreadyOpen(path));
            }
        }

        match Self::init(path.clone(), writer) {
            Ok(db) => Ok(db),
            Err(e) => {
                release(&path);
                Err(e)
            }
        }
    }

    fn init(path: PathBuf, writer: Connection) -> Result<Self> {
        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.busy_timeout(std::time::Duration::from_secs(5))?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` inside an IMMEDIATE transaction on the writer. Commits on
    /// `Ok`, rolls back on `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        release(&self.path);
        info!("Database closed at {}", self.path.display());
    }
}

fn release(path: &Path) {
    if let Ok(mut open) = OPEN_PATHS.lock() {
        open.remove(path);
    }
}

/// Runs a blocking store call on tokio's blocking pool.
pub async fn call_blocking<T, F>(db: Arc<Database>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(db.as_ref()))
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TempDb;

    #[test]
    fn second_open_of_same_file_is_rejected() {
        let tmp = TempDb::new();
        let err = Database::open(tmp.path()).err().expect("second open must fail");
        assert!(matches!(err, StoreError::AlreadyOpen(_)));
    }

    #[test]
    fn file_can_be_reopened_after_drop() {
        let tmp = TempDb::new();
        let path = tmp.path().to_path_buf();
        tmp.db.append_highlight(1, "kept").unwrap();
        let reopened = tmp.reopen();
        assert_eq!(reopened.db.total_count().unwrap(), 1);
        assert_eq!(reopened.path(), path.as_path());
    }

    #[tokio::test]
    async fn call_blocking_runs_off_the_runtime() {
        let tmp = TempDb::new();
        let db = Arc::clone(&tmp.db);
        let h = call_blocking(db, |db| db.append_highlight(9, "async")).await.unwrap();
        assert_eq!(h.user_id, 9);
    }
}
