//! Month bucketing over the highlight time index.
//!
//! Everything is stored in UTC. The viewer's zone is only applied here: when
//! deriving which month a timestamp falls in, and when turning a selected
//! month back into a UTC query range.

use chrono::{DateTime, TimeZone};
use turboclip_types::models::{Highlight, Month};

use crate::{Database, Result, StoreError};

/// Buttons per row in the month picker.
pub const GRID_ROW_WIDTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCell {
    Month(Month),
    /// Inert padding on the last row.
    Filler,
}

impl Database {
    /// Every month from the earliest highlight up to and including the month
    /// of `now`, both read in `now`'s zone. Empty when there are no highlights.
    pub fn list_months<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Vec<Month>> {
        let Some(earliest) = self.earliest_timestamp()? else {
            return Ok(Vec::new());
        };
        let first = Month::of(&earliest.with_timezone(&now.timezone()));
        Ok(months_between(first, Month::of(now)))
    }

    /// Highlights created during `month` as seen from `tz`.
    pub fn month_highlights<Tz: TimeZone>(&self, month: Month, tz: &Tz) -> Result<Vec<Highlight>> {
        let (start, end) = month
            .utc_range_in(tz)
            .ok_or(StoreError::UnresolvableMonth(month))?;
        self.range_query(start, end)
    }
}

/// Inclusive month range. Empty if `first` is after `last`.
pub fn months_between(first: Month, last: Month) -> Vec<Month> {
    let mut months = Vec::new();
    let mut m = first;
    while m <= last {
        months.push(m);
        m = m.next();
    }
    months
}

/// Lays months out in rows of `row_width`, padding the last row with fillers.
pub fn month_grid(months: &[Month], row_width: usize) -> Vec<Vec<GridCell>> {
    if months.is_empty() || row_width == 0 {
        return Vec::new();
    }

    months
        .chunks(row_width)
        .map(|chunk| {
            let mut row: Vec<GridCell> = chunk.iter().copied().map(GridCell::Month).collect();
            row.resize(row_width, GridCell::Filler);
            row
        })
        .collect()
}
