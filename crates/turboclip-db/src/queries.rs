use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use turboclip_types::models::{Highlight, Stat, User};

use crate::models::{HighlightRow, UserRow, from_micros, to_micros};
use crate::{Database, Result, StoreError};

impl Database {
    // -- Users --

    /// Looks the user up and creates it when missing, in one transaction.
    /// Returns the user and whether this call created it.
    pub fn add_or_find_user(&self, id: i64) -> Result<(User, bool)> {
        self.add_or_find_user_at(id, Utc::now())
    }

    pub fn add_or_find_user_at(&self, id: i64, now: DateTime<Utc>) -> Result<(User, bool)> {
        self.with_tx(|tx| {
            if let Some(row) = query_user(tx, id)? {
                return Ok((row.into_user()?, false));
            }

            let registered_at = to_micros(now);
            tx.execute(
                "INSERT INTO users (id, name, registered_at) VALUES (?1, '', ?2)",
                params![id, registered_at],
            )?;

            let user = User {
                id,
                name: String::new(),
                registered_at: from_micros(registered_at)?,
            };
            Ok((user, true))
        })
    }

    pub fn find_user(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id)?.map(UserRow::into_user).transpose())
    }

    pub fn apply_name(&self, id: i64, name: &str) -> Result<()> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE users SET name = ?2 WHERE id = ?1",
                params![id, name],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound { entity: "user", id });
            }
            Ok(())
        })
    }

    /// Batch-fetch display names for a set of user ids. Unknown ids are
    /// absent from the map.
    pub fn user_names(&self, ids: &[i64]) -> Result<HashMap<i64, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, name FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let names = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;

            Ok(names)
        })
    }

    // -- Highlights --

    pub fn append_highlight(&self, user_id: i64, text: &str) -> Result<Highlight> {
        self.append_highlight_at(user_id, text, Utc::now())
    }

    pub fn append_highlight_at(
        &self,
        user_id: i64,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<Highlight> {
        let created_at = to_micros(at);
        let id = self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO highlights (user_id, created_at, text) VALUES (?1, ?2, ?3)",
                params![user_id, created_at, text],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(Highlight {
            id,
            user_id,
            created_at: from_micros(created_at)?,
            text: text.to_string(),
        })
    }

    /// Highlights of `user_id` with `created_at >= since`.
    pub fn count_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM highlights WHERE user_id = ?1 AND created_at >= ?2",
                params![user_id, to_micros(since)],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn total_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM highlights", [], |r| r.get(0))?;
            Ok(count)
        })
    }

    pub fn count_for_user(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM highlights WHERE user_id = ?1",
                [user_id],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn stat(&self, user_id: i64) -> Result<Stat> {
        Ok(Stat {
            total: self.total_count()?,
            user_total: self.count_for_user(user_id)?,
        })
    }

    pub fn earliest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let first: Option<i64> = self.with_conn(|conn| {
            let first = conn
                .query_row(
                    "SELECT created_at FROM highlights ORDER BY created_at, id LIMIT 1",
                    [],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(first)
        })?;
        first.map(from_micros).transpose()
    }

    /// All highlights with `start <= created_at < end`, oldest first, ties by id.
    pub fn range_query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Highlight>> {
        let rows = self.with_conn(|conn| query_range(conn, to_micros(start), to_micros(end)))?;
        rows.into_iter().map(HighlightRow::into_highlight).collect()
    }
}

fn query_user(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT id, name, registered_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                registered_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_range(conn: &Connection, start: i64, end: i64) -> Result<Vec<HighlightRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, created_at, text
         FROM highlights INDEXED BY idx_highlights_time
         WHERE created_at >= ?1 AND created_at < ?2
         ORDER BY created_at, id",
    )?;

    let rows = stmt
        .query_map(params![start, end], |row| {
            Ok(HighlightRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: row.get(2)?,
                text: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
