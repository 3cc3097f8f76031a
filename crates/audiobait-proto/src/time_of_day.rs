//! Wall-clock time-of-day, independent of any calendar date.

use chrono::Timelike;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An hour/minute pair with no associated date. Parsed from `"HH:MM"`
/// (`"H:MM"` also accepted); an absent or `"null"` value parses to midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    pub fn midnight() -> Self {
        Self { hour: 0, minute: 0 }
    }

    /// Parses `"H:MM"` / `"HH:MM"`. Treats `"null"` and the empty string as
    /// midnight, matching the server's JSON-null convention for unset fields.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("null") {
            return Ok(Self::midnight());
        }
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid time of day: {s:?}"))?;
        let hour: u32 = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid hour in {s:?}"))?;
        let minute: u32 = m
            .trim()
            .parse()
            .map_err(|_| format!("invalid minute in {s:?}"))?;
        Self::new(hour, minute).ok_or_else(|| format!("time of day out of range: {s:?}"))
    }

    /// Seconds since local midnight.
    pub fn seconds_since_midnight(&self) -> i64 {
        (self.hour as i64) * 3600 + (self.minute as i64) * 60
    }

    pub fn from_datetime<Tz: chrono::TimeZone>(dt: &chrono::DateTime<Tz>) -> Self {
        Self {
            hour: dt.hour(),
            minute: dt.minute(),
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        match opt {
            None => Ok(Self::midnight()),
            Some(s) => TimeOfDay::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}
