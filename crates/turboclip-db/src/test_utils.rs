use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::Database;

/// A database file in the temp dir, removed with its WAL files on drop.
pub struct TempDb {
    pub db: Arc<Database>,
    path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("turboclip_test_{}.db", Uuid::new_v4()));
        let db = Database::open(&path).unwrap();
        let path = db.path().to_path_buf();
        Self { db: Arc::new(db), path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the database and opens the same file again.
    pub fn reopen(mut self) -> Self {
        let path = std::mem::take(&mut self.path);
        drop(self);
        let db = Database::open(&path).unwrap();
        Self { db: Arc::new(db), path }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}
