use rusqlite::Connection;
use tracing::info;

use crate::Result;

/// Timestamps are stored as INTEGER microseconds since the Unix epoch, UTC.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Database: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL DEFAULT '',
                registered_at   INTEGER NOT NULL
            );

            -- user_id is intentionally not a foreign key: callers create the
            -- user first, the store does not check.
            CREATE TABLE highlights (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL,
                created_at  INTEGER NOT NULL,
                text        TEXT NOT NULL
            );

            CREATE INDEX idx_highlights_time
                ON highlights(created_at, id);

            CREATE INDEX idx_highlights_user_time
                ON highlights(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
