use std::path::PathBuf;

use thiserror::Error;
use turboclip_types::models::Month;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("the database is already open: {}", .0.display())]
    AlreadyOpen(PathBuf),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("storage task failed: {0}")]
    Join(String),

    #[error("corrupt timestamp in database: {0}")]
    CorruptTimestamp(i64),

    #[error("month {0} has no midnight on the 1st in the viewer time zone")]
    UnresolvableMonth(Month),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
