//! The zone highlights are grouped and shown in.
//!
//! Either the host's local zone, which follows daylight saving time, or a
//! fixed offset from configuration. Offsets are resolved per instant, so a
//! January timestamp read in July still gets the January offset.

use std::fmt;
use std::str::FromStr;

use chrono::{FixedOffset, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewerZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

/// An offset resolved in a [`ViewerZone`]. Remembers the zone so that
/// `DateTime<ViewerZone>::timezone()` stays local instead of freezing the
/// offset of that instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerOffset {
    zone: ViewerZone,
    offset: FixedOffset,
}

impl Offset for ViewerOffset {
    fn fix(&self) -> FixedOffset {
        self.offset
    }
}

impl fmt::Display for ViewerOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.offset, f)
    }
}

impl ViewerZone {
    fn resolve(&self, offset: FixedOffset) -> ViewerOffset {
        ViewerOffset { zone: *self, offset }
    }
}

impl TimeZone for ViewerZone {
    type Offset = ViewerOffset;

    fn from_offset(offset: &ViewerOffset) -> Self {
        offset.zone
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<ViewerOffset> {
        let local = local.and_time(chrono::NaiveTime::MIN);
        self.offset_from_local_datetime(&local)
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<ViewerOffset> {
        let offset = match self {
            ViewerZone::Local => chrono::Local.offset_from_local_datetime(local),
            ViewerZone::Fixed(offset) => offset.offset_from_local_datetime(local),
        };
        offset.map(|o| self.resolve(o))
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> ViewerOffset {
        self.offset_from_utc_datetime(&utc.and_time(chrono::NaiveTime::MIN))
    }

    fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> ViewerOffset {
        let offset = match self {
            ViewerZone::Local => chrono::Local.offset_from_utc_datetime(utc),
            ViewerZone::Fixed(offset) => offset.offset_from_utc_datetime(utc),
        };
        self.resolve(offset)
    }
}

impl fmt::Display for ViewerZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerZone::Local => f.write_str("local"),
            ViewerZone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// `local` or an offset such as `+03:00`.
impl FromStr for ViewerZone {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("local") {
            return Ok(ViewerZone::Local);
        }
        s.parse().map(ViewerZone::Fixed)
    }
}
