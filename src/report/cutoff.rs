//! Lookback window resolution

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound, TimeDelta};
use std::fmt;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Timestamp layout the store prints and compares with
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Coerce a raw `daysBack` value. Missing, empty or non-numeric input falls
/// back to `default`; zero and negative values are kept.
pub fn parse_days_back(raw: Option<&str>, default: f64) -> f64 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .unwrap_or(default)
}

/// First instant the store accepts as timestamp text (`0001-01-01 00:00:00`)
fn earliest() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Last instant with a four-digit year (`9999-12-31 23:59:59`)
fn latest() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Absolute instant records must be newer than to be reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cutoff {
    days_back: f64,
    instant: NaiveDateTime,
}

impl Cutoff {
    /// Cutoff relative to the server's local clock
    pub fn resolve(days_back: f64) -> Self {
        Self::at(Local::now().naive_local(), days_back)
    }

    /// Cutoff relative to `now`, truncated to whole seconds and clamped to
    /// years 1..=9999
    pub fn at(now: NaiveDateTime, days_back: f64) -> Self {
        let (earliest, latest) = (earliest(), latest());
        let millis = (days_back * SECONDS_PER_DAY * 1000.0).round() as i64;
        let instant = TimeDelta::try_milliseconds(millis)
            .and_then(|delta| now.checked_sub_signed(delta))
            .unwrap_or(if days_back > 0.0 { earliest } else { latest });

        Self {
            days_back,
            instant: instant.trunc_subsecs(0).clamp(earliest, latest),
        }
    }

    pub fn days_back(&self) -> f64 {
        self.days_back
    }

    pub fn instant(&self) -> NaiveDateTime {
        self.instant
    }
}

/// Renders in the store's native timestamp format
impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instant.format(TIMESTAMP_FORMAT))
    }
}
