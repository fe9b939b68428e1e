use chrono::{DateTime, TimeDelta, Utc};

use crate::{Database, Result};

/// Highlights a single user may submit per window.
pub const MAX_PER_HOUR: i64 = 10;

/// Caps how many highlights one user can add within a trailing window.
///
/// Holds no counters: every check re-counts the user's highlights in the
/// store, so the window slides on its own.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    pub max_per_window: i64,
    pub window: TimeDelta,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self {
            max_per_window: MAX_PER_HOUR,
            window: TimeDelta::hours(1),
        }
    }
}

impl RateLimiter {
    pub fn allow_new_highlight(&self, db: &Database, user_id: i64) -> Result<bool> {
        self.allow_new_highlight_at(db, user_id, Utc::now())
    }

    pub fn allow_new_highlight_at(
        &self,
        db: &Database,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let recent = db.count_since(user_id, now - self.window)?;
        Ok(recent < self.max_per_window)
    }
}
