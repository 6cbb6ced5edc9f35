use chrono::{DateTime, NaiveTime, TimeDelta, Timelike, Utc};

use crate::error::{ForecastError, Result};

/// A half-open, hour-aligned UTC range `[start, start + hours)`.
///
/// Every forecast and weather fetch is expressed as one `HourRange`; its
/// timestamps are the only ones a weather source may return.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use pv_forecast::weather::HourRange;
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let range = HourRange::new(start, 3).unwrap();
/// let hours: Vec<u32> = range.timestamps().map(|t| chrono::Timelike::hour(&t)).collect();
/// assert_eq!(hours, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HourRange {
    start: DateTime<Utc>,
    hours: usize,
}

impl HourRange {
    /// Creates a range of `hours` hourly timestamps beginning at `start`.
    ///
    /// # Errors
    ///
    /// Returns `InputValidation` if `start` is not on a whole hour or `hours` is zero.
    pub fn new(start: DateTime<Utc>, hours: usize) -> Result<Self> {
        if hours == 0 {
            return Err(ForecastError::invalid("hour range must not be empty"));
        }
        if truncate_to_hour(start) != start {
            return Err(ForecastError::invalid(format!(
                "range start {start} is not hour-aligned"
            )));
        }
        Ok(Self { start, hours })
    }

    /// `days` whole UTC days starting at midnight of the day containing `now`.
    pub fn days_from_midnight(now: DateTime<Utc>, days: usize) -> Self {
        Self {
            start: now.date_naive().and_time(NaiveTime::MIN).and_utc(),
            hours: days.max(1) * 24,
        }
    }

    /// `days × 24` hours starting at the hour containing `now`.
    pub fn days_from_hour(now: DateTime<Utc>, days: usize) -> Self {
        Self {
            start: truncate_to_hour(now),
            hours: days.max(1) * 24,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn hours(&self) -> usize {
        self.hours
    }

    /// Exclusive end of the range.
    pub fn end(&self) -> DateTime<Utc> {
        self.start + hours_delta(self.hours)
    }

    /// Last timestamp inside the range.
    pub fn last(&self) -> DateTime<Utc> {
        self.start + hours_delta(self.hours - 1)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end()
    }

    /// Iterates all hourly timestamps in chronological order.
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.hours).map(move |h| self.start + hours_delta(h))
    }
}

/// Drops minutes, seconds and sub-second parts of `ts`.
pub fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts - TimeDelta::seconds(i64::from(ts.minute()) * 60 + i64::from(ts.second()))
        - TimeDelta::nanoseconds(i64::from(ts.nanosecond()))
}

fn hours_delta(hours: usize) -> TimeDelta {
    TimeDelta::hours(i64::try_from(hours).unwrap_or(i64::MAX / 3_600_000))
}
