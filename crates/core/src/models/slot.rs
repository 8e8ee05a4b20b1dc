//! Calendar slot model

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Date format used for slots on the wire and in storage
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format used for slots on the wire and in storage
pub const TIME_FORMAT: &str = "%H:%M";

/// A bookable (date, optional time) pair on a listing's calendar.
///
/// A slot without a time covers the whole day. Ordering is by date, then
/// whole-day slots before timed ones, then by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    #[serde(default, with = "hhmm_opt")]
    pub time: Option<NaiveTime>,
}

impl Slot {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self { date, time }
    }

    pub fn at(date: NaiveDate, time: NaiveTime) -> Self {
        Self::new(date, Some(time))
    }

    /// Parse from separate date and time strings (`YYYY-MM-DD`, `HH:MM`)
    pub fn parse(date: &str, time: Option<&str>) -> Result<Self, Error> {
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
            .map_err(|e| Error::InvalidSlot(format!("bad date '{}': {}", date, e)))?;

        let time = match time.map(str::trim) {
            None | Some("") => None,
            Some(t) => Some(
                NaiveTime::parse_from_str(t, TIME_FORMAT)
                    .map_err(|e| Error::InvalidSlot(format!("bad time '{}': {}", t, e)))?,
            ),
        };

        Ok(Self { date, time })
    }

    /// Start of the slot; whole-day slots start at `default_time`
    pub fn starts_at(&self, default_time: NaiveTime) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(default_time))
    }

    /// A slot is in the past once its start has been reached.
    /// Whole-day slots stay bookable for the whole of their date.
    pub fn is_past(&self, now: NaiveDateTime) -> bool {
        match self.time {
            Some(time) => self.date.and_time(time) <= now,
            None => self.date < now.date(),
        }
    }

    /// Storage form of the time component (empty for whole-day)
    pub fn time_key(&self) -> String {
        self.time
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_default()
    }

    pub fn date_key(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time {
            Some(_) => write!(f, "{}/{}", self.date_key(), self.time_key()),
            None => write!(f, "{}", self.date_key()),
        }
    }
}

impl FromStr for Slot {
    type Err = Error;

    /// Accepts `YYYY-MM-DD` or `YYYY-MM-DD/HH:MM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((date, time)) => Slot::parse(date, Some(time)),
            None => Slot::parse(s, None),
        }
    }
}

pub(crate) mod hhmm_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIME_FORMAT;

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_some(&t.format(TIME_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(t) => NaiveTime::parse_from_str(t, TIME_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
