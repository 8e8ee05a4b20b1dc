//! Error types for Diyafa Core

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::models::{BookingStatus, Slot, Transition};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Slot {slot} on listing {listing_id} is no longer available")]
    SlotUnavailable { listing_id: Uuid, slot: Slot },

    #[error("Slot {slot} on listing {listing_id} is not reserved")]
    NotReserved { listing_id: Uuid, slot: Slot },

    #[error("Booking {booking_id}: cannot {attempted} from {from}")]
    IllegalTransition {
        booking_id: Uuid,
        from: BookingStatus,
        attempted: Transition,
    },

    #[error("Booking {booking_id} can no longer be cancelled ({cutoff_hours}h cutoff)")]
    CancellationClosed { booking_id: Uuid, cutoff_hours: u32 },

    #[error("Listing {0} is referenced by bookings")]
    ListingInUse(Uuid),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], as surfaced to API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    SlotUnavailable,
    IllegalTransition,
    NotReserved,
    CancellationClosed,
    ListingInUse,
    Forbidden,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for this kind
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::SlotUnavailable
            | ErrorKind::IllegalTransition
            | ErrorKind::NotReserved
            | ErrorKind::CancellationClosed
            | ErrorKind::ListingInUse => 409,
            ErrorKind::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SlotUnavailable => "slot_unavailable",
            ErrorKind::IllegalTransition => "illegal_transition",
            ErrorKind::NotReserved => "not_reserved",
            ErrorKind::CancellationClosed => "cancellation_closed",
            ErrorKind::ListingInUse => "listing_in_use",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::InvalidSlot(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::SlotUnavailable { .. } => ErrorKind::SlotUnavailable,
            Error::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Error::NotReserved { .. } => ErrorKind::NotReserved,
            Error::CancellationClosed { .. } => ErrorKind::CancellationClosed,
            Error::ListingInUse(_) => ErrorKind::ListingInUse,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Database(_) | Error::Config(_) | Error::Io(_) | Error::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Whether the caller should go back to search instead of retrying
    pub fn should_research(&self) -> bool {
        matches!(self, Error::SlotUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_status_mapping() {
        let slot = Slot::new(NaiveDate::from_ymd_opt(2025, 12, 10).unwrap(), None);
        let id = Uuid::new_v4();

        assert_eq!(Error::Validation("guests".into()).status_code(), 400);
        assert_eq!(Error::InvalidSlot("past".into()).status_code(), 400);
        assert_eq!(Error::NotFound("listing".into()).status_code(), 404);
        assert_eq!(Error::Forbidden("not yours".into()).status_code(), 403);
        assert_eq!(
            Error::SlotUnavailable { listing_id: id, slot }.status_code(),
            409
        );
        assert_eq!(
            Error::IllegalTransition {
                booking_id: id,
                from: BookingStatus::Cancelled,
                attempted: Transition::Accept,
            }
            .status_code(),
            409
        );
        assert_eq!(Error::ListingInUse(id).status_code(), 409);
    }

    #[test]
    fn test_conflict_kinds_are_distinct() {
        let slot = Slot::new(NaiveDate::from_ymd_opt(2025, 12, 10).unwrap(), None);
        let id = Uuid::new_v4();
        let conflicts = [
            Error::SlotUnavailable { listing_id: id, slot },
            Error::IllegalTransition {
                booking_id: id,
                from: BookingStatus::Confirmed,
                attempted: Transition::Refuse,
            },
            Error::NotReserved { listing_id: id, slot },
            Error::CancellationClosed {
                booking_id: id,
                cutoff_hours: 24,
            },
            Error::ListingInUse(id),
        ];

        let kinds: std::collections::HashSet<&str> =
            conflicts.iter().map(|e| e.kind().as_str()).collect();
        assert_eq!(kinds.len(), conflicts.len());
        assert!(conflicts.iter().all(|e| e.status_code() == 409));
        assert_eq!(
            Error::CancellationClosed {
                booking_id: id,
                cutoff_hours: 24
            }
            .kind()
            .as_str(),
            "cancellation_closed"
        );
    }

    #[test]
    fn test_only_lost_races_prompt_research() {
        let slot = Slot::new(NaiveDate::from_ymd_opt(2025, 12, 10).unwrap(), None);
        let id = Uuid::new_v4();
        assert!(Error::SlotUnavailable { listing_id: id, slot }.should_research());
        assert!(!Error::NotReserved { listing_id: id, slot }.should_research());
    }
}
