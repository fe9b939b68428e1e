//! Database row types. Timestamps stay as raw microseconds until converted
//! into the domain models from turboclip-types.

use chrono::{DateTime, Utc};
use turboclip_types::models::{Highlight, User};

use crate::{Result, StoreError};

pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub registered_at: i64,
}

pub struct HighlightRow {
    pub id: i64,
    pub user_id: i64,
    pub created_at: i64,
    pub text: String,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id,
            name: self.name,
            registered_at: from_micros(self.registered_at)?,
        })
    }
}

impl HighlightRow {
    pub fn into_highlight(self) -> Result<Highlight> {
        Ok(Highlight {
            id: self.id,
            user_id: self.user_id,
            created_at: from_micros(self.created_at)?,
            text: self.text,
        })
    }
}

pub fn to_micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

pub fn from_micros(us: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).ok_or(StoreError::CorruptTimestamp(us))
}
