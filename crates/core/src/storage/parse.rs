//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::{ActorRole, BookingStatus, Slot, DATE_FORMAT, TIME_FORMAT};

fn conversion_error<E>(column: usize, e: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(column, Type::Text, Box::new(e))
}

/// Stored enum value that no longer maps to a variant
#[derive(Debug, thiserror::Error)]
#[error("unknown {what} value '{value}'")]
struct UnknownValue {
    what: &'static str,
    value: String,
}

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(|e| conversion_error(0, e))
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(0, e))
}

/// Parse a slot from its `slot_date` / `slot_time` columns.
/// An empty time column is a whole-day slot.
pub fn parse_slot(date: &str, time: &str) -> Result<Slot, SqlError> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|e| conversion_error(0, e))?;
    let time = if time.is_empty() {
        None
    } else {
        Some(NaiveTime::parse_from_str(time, TIME_FORMAT).map_err(|e| conversion_error(0, e))?)
    };
    Ok(Slot::new(date, time))
}

/// Parse an optional `HH:MM` column
pub fn parse_time_opt(s: Option<String>) -> Result<Option<NaiveTime>, SqlError> {
    s.filter(|t| !t.is_empty())
        .map(|t| NaiveTime::parse_from_str(&t, TIME_FORMAT).map_err(|e| conversion_error(0, e)))
        .transpose()
}

/// Parse a booking status column
pub fn parse_status(s: &str) -> Result<BookingStatus, SqlError> {
    BookingStatus::parse(s).ok_or_else(|| {
        conversion_error(
            0,
            UnknownValue {
                what: "booking status",
                value: s.to_string(),
            },
        )
    })
}

/// Parse an optional actor role column
pub fn parse_role_opt(s: Option<String>) -> Result<Option<ActorRole>, SqlError> {
    s.map(|s| {
        ActorRole::parse(&s).ok_or_else(|| {
            conversion_error(
                0,
                UnknownValue {
                    what: "actor role",
                    value: s.clone(),
                },
            )
        })
    })
    .transpose()
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
