//! Booking state machine
//!
//! ```text
//!            accept
//!  pending ----------> confirmed
//!     |                    |
//!     | refuse / cancel    | cancel
//!     v                    v
//!  cancelled <-------------+
//! ```
//!
//! `cancelled` is terminal. Every move into it releases the slot in the
//! availability ledger.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::invariants::{assert_booking_invariants, assert_slot_conservation};
use crate::models::{ActorRole, Booking, BookingStatus, Transition};
use crate::storage::{AvailabilityLedger, BookingStore};

/// Target status of `transition` from `from`, or `None` if illegal
pub fn next_status(from: BookingStatus, transition: Transition) -> Option<BookingStatus> {
    match (from, transition) {
        (BookingStatus::Pending, Transition::Accept) => Some(BookingStatus::Confirmed),
        (BookingStatus::Pending, Transition::Refuse) => Some(BookingStatus::Cancelled),
        (BookingStatus::Pending, Transition::Cancel) => Some(BookingStatus::Cancelled),
        (BookingStatus::Confirmed, Transition::Cancel) => Some(BookingStatus::Cancelled),
        (BookingStatus::Confirmed, Transition::Accept | Transition::Refuse) => None,
        (BookingStatus::Cancelled, _) => None,
    }
}

/// Drives bookings through their lifecycle over one connection or
/// transaction, keeping booking status and slot state in step.
pub struct BookingMachine<'a> {
    bookings: BookingStore<'a>,
    ledger: AvailabilityLedger<'a>,
}

impl<'a> BookingMachine<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            bookings: BookingStore::new(conn),
            ledger: AvailabilityLedger::new(conn),
        }
    }

    /// Reserve the booking's slot and record it as pending.
    /// A failed insert gives the slot back before returning the error.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, slot = %booking.slot))]
    pub fn open(&self, booking: &Booking) -> Result<()> {
        debug_assert_eq!(booking.status, BookingStatus::Pending);
        assert_booking_invariants(booking);

        self.ledger
            .reserve(booking.listing_id, &booking.slot, booking.id)?;

        if let Err(e) = self.bookings.create(booking) {
            warn!(booking_id = %booking.id, error = %e, "Booking insert failed, releasing slot");
            self.ledger
                .release(booking.listing_id, &booking.slot, booking.id)?;
            return Err(e);
        }

        info!(booking_id = %booking.id, listing_id = %booking.listing_id, "Booking pending");
        Ok(())
    }

    /// Apply `transition` to `booking` as last read by the caller.
    /// Fails with `IllegalTransition` if the move is not allowed or the
    /// stored status no longer matches.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, from = %booking.status))]
    pub fn apply(
        &self,
        booking: &Booking,
        transition: Transition,
        by: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let illegal = |from| Error::IllegalTransition {
            booking_id: booking.id,
            from,
            attempted: transition,
        };

        let to = next_status(booking.status, transition).ok_or_else(|| illegal(booking.status))?;
        let cancelled_by = (to == BookingStatus::Cancelled).then_some(by);

        if !self
            .bookings
            .transition(booking.id, booking.status, to, cancelled_by, now)?
        {
            let current = self
                .bookings
                .find_by_id(booking.id)?
                .map(|b| b.status)
                .unwrap_or(booking.status);
            return Err(illegal(current));
        }

        if to == BookingStatus::Cancelled {
            self.ledger
                .release(booking.listing_id, &booking.slot, booking.id)?;
        }

        info!(booking_id = %booking.id, %transition, to = %to, by = by.as_str(), "Booking transitioned");

        let updated = self
            .bookings
            .find_by_id(booking.id)?
            .ok_or_else(|| Error::NotFound(format!("booking {}", booking.id)))?;

        if cfg!(debug_assertions) {
            assert_booking_invariants(&updated);
            assert_slot_conservation(
                &updated,
                self.ledger.slot_state(updated.listing_id, &updated.slot)?,
                self.ledger.holder(updated.listing_id, &updated.slot)?,
            );
        }

        Ok(updated)
    }
}
