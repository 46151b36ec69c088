use chrono::{DateTime, FixedOffset, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::utils::error::{Result, StorefrontError};

const MINUTES_PER_DAY: u16 = 24 * 60;

fn hhmm_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{2}:[0-9]{2}$").expect("static regex pattern"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(StorefrontError::validation(format!(
                "Clock time out of range: {:02}:{:02}",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }

    pub fn from_minutes(minutes: u16) -> Self {
        let minutes = minutes % MINUTES_PER_DAY;
        Self {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }
}

impl FromStr for ClockTime {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self> {
        if !hhmm_regex().is_match(s) {
            return Err(StorefrontError::validation(format!(
                "Expected HH:MM, got '{}'",
                s
            )));
        }
        // 正規表達式已保證是兩位數字
        let hour: u8 = s[0..2]
            .parse()
            .map_err(|_| StorefrontError::validation(format!("Bad hour in '{}'", s)))?;
        let minute: u8 = s[3..5]
            .parse()
            .map_err(|_| StorefrontError::validation(format!("Bad minute in '{}'", s)))?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Same-day window when `start <= end`, otherwise it wraps past midnight.
/// Both bounds are inclusive, so `start == end` is open for that one minute.
pub fn is_open(now: ClockTime, start: ClockTime, end: ClockTime) -> bool {
    let now = now.minutes_since_midnight();
    let start = start.minutes_since_midnight();
    let end = end.minutes_since_midnight();

    if start <= end {
        now >= start && now <= end
    } else {
        now >= start || now <= end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
}

impl WorkingHours {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let hours = Self {
            start: start.trim().to_string(),
            end: end.trim().to_string(),
        };
        hours.bounds()?;
        Ok(hours)
    }

    pub fn bounds(&self) -> Result<(ClockTime, ClockTime)> {
        Ok((self.start.parse()?, self.end.parse()?))
    }

    pub fn wraps_midnight(&self) -> bool {
        matches!(self.bounds(), Ok((start, end)) if start > end)
    }

    /// 設定格式錯誤時一律視為關門
    pub fn is_open_at(&self, now: ClockTime) -> bool {
        match self.bounds() {
            Ok((start, end)) => is_open(now, start, end),
            Err(e) => {
                tracing::warn!("⚠️ Malformed working hours {:?}: {}", self, e);
                false
            }
        }
    }
}

impl fmt::Display for WorkingHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Missing configuration counts as closed.
pub fn is_open_with(hours: Option<&WorkingHours>, now: ClockTime) -> bool {
    hours.map(|h| h.is_open_at(now)).unwrap_or(false)
}

/// Parses "+05:00" / "-03:30" / "Z".
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| StorefrontError::validation("invalid zero offset"));
    }

    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => {
            return Err(StorefrontError::validation(format!(
                "UTC offset must start with '+' or '-': '{}'",
                value
            )))
        }
    };
    let time: ClockTime = rest.parse()?;
    let seconds = sign * (time.minutes_since_midnight() as i32) * 60;
    FixedOffset::east_opt(seconds)
        .ok_or_else(|| StorefrontError::validation(format!("UTC offset out of range: '{}'", value)))
}

pub fn local_clock(now: DateTime<Utc>, offset: FixedOffset) -> ClockTime {
    let local = now.with_timezone(&offset);
    ClockTime::from_minutes(local.hour() as u16 * 60 + local.minute() as u16)
}
