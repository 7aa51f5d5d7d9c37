//! Daily wall-clock scheduling in a named timezone.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Days, LocalResult, NaiveDateTime, TimeDelta, TimeZone};

use crate::error::CoreError;

/// Shortest delay ever returned, so a loop can never spin.
pub const MIN_DELAY: Duration = Duration::from_secs(1);

/// A time of day, `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime {
    hour: u32,
    minute: u32,
}

impl DailyTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }
}

impl Default for DailyTime {
    /// One minute past midnight.
    fn default() -> Self {
        Self { hour: 0, minute: 1 }
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for DailyTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("Invalid time of day '{s}', expected HH:MM"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = h.trim().parse().map_err(|_| invalid())?;
        let minute = m.trim().parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

/// Time from `now` until the next occurrence of `at` in `now`'s timezone.
///
/// If today's occurrence is at or before `now`, tomorrow's is used. A local
/// time skipped by a DST transition resolves to the first instant after the
/// gap; an ambiguous one to its earlier instant. Never returns less than
/// [`MIN_DELAY`].
pub fn delay_until_next<Tz: TimeZone>(now: &DateTime<Tz>, at: DailyTime) -> Result<Duration, CoreError> {
    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..=2 {
        let date = today
            .checked_add_days(Days::new(offset))
            .ok_or_else(|| CoreError::Internal("date out of range".to_string()))?;
        let Some(naive) = date.and_hms_opt(at.hour, at.minute, 0) else {
            continue;
        };
        let Some(target) = resolve_local(&tz, naive) else {
            continue;
        };
        if target > *now {
            let delay = (target - now.clone())
                .to_std()
                .map_err(|e| CoreError::Internal(format!("negative delay: {e}")))?;
            return Ok(delay.max(MIN_DELAY));
        }
    }

    Err(CoreError::Internal(format!(
        "no upcoming occurrence of {at} could be computed"
    )))
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // Skipped by a DST jump; gaps are at most an hour in practice.
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest(),
    }
}
