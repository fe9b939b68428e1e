//! Turns store data into Telegram text and keyboards.

use std::collections::HashMap;

use chrono::{Datelike, TimeDelta, TimeZone};
use turboclip_db::calendar::GridCell;
use turboclip_types::models::{Highlight, Month};
use turboclip_types::telegram::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Callback data of inert grid buttons.
pub const FILLER_DATA: &str = "NOP";

/// Telegram rejects longer messages.
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub fn month_keyboard(grid: &[Vec<GridCell>]) -> InlineKeyboardMarkup {
    let inline_keyboard = grid
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    GridCell::Month(m) => InlineKeyboardButton {
                        text: m.short_label(),
                        callback_data: m.to_string(),
                    },
                    GridCell::Filler => InlineKeyboardButton {
                        text: "...".into(),
                        callback_data: FILLER_DATA.into(),
                    },
                })
                .collect()
        })
        .collect();
    InlineKeyboardMarkup { inline_keyboard }
}

/// Markdown listing of one month, grouped by day in `tz`.
pub fn month_listing<Tz: TimeZone>(
    month: Month,
    highlights: &[Highlight],
    names: &HashMap<i64, String>,
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = format!(
        "*====== {:02}.{:02} ======*\n",
        month.month,
        month.year.rem_euclid(100)
    );
    let mut day = None;

    for h in highlights {
        let local = h.created_at.with_timezone(tz);
        if day != Some(local.day()) {
            day = Some(local.day());
            out.push_str(&local.format("\n*[ %d.%m.%y ]*\n").to_string());
        }
        let name = names.get(&h.user_id).map(String::as_str).unwrap_or("?");
        out.push_str(&format!("*{} - \"{}\"*\n{}\n", local.format("%H:%M"), name, h.text));
    }

    out
}

/// Splits `text` into chunks of at most `limit` chars, preferring line
/// breaks. A single line longer than `limit` is cut at char boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// `2d 3h 4m 5s`, omitting leading zero units.
pub fn format_uptime(d: TimeDelta) -> String {
    let secs = d.num_seconds().max(0);
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let (hours, rem) = (rem / 3_600, rem % 3_600);
    let (mins, secs) = (rem / 60, rem % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if days > 0 || hours > 0 || mins > 0 {
        parts.push(format!("{}m", mins));
    }
    parts.push(format!("{}s", secs));
    parts.join(" ")
}
