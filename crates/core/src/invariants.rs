//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Listing};
use crate::storage::SlotState;

/// Validate that a booking's stored fields are internally consistent
pub fn assert_booking_invariants(booking: &Booking) {
    // Total is fixed at creation time
    debug_assert!(
        booking.price_per_person.checked_times(booking.guests) == Some(booking.total_price),
        "Booking {} total {} != {} x {}",
        booking.id,
        booking.total_price,
        booking.price_per_person,
        booking.guests
    );

    debug_assert!(
        booking.guests >= 1,
        "Booking {} has no guests",
        booking.id
    );

    // Only cancelled bookings record who cancelled
    debug_assert!(
        booking.cancelled_by.is_none() || booking.status == BookingStatus::Cancelled,
        "Booking {} is {} but has cancelled_by {:?}",
        booking.id,
        booking.status,
        booking.cancelled_by
    );

    debug_assert!(
        booking.meal_time.is_none() || booking.slot.time.is_none(),
        "Booking {} has a meal time on timed slot {}",
        booking.id,
        booking.slot
    );

    debug_assert!(
        booking.updated_at >= booking.created_at,
        "Booking {} updated before it was created",
        booking.id
    );
}

/// Validate that a slot's ledger state agrees with the booking holding it
pub fn assert_slot_conservation(booking: &Booking, state: Option<SlotState>, holder: Option<Uuid>) {
    if booking.status.is_active() {
        debug_assert!(
            state == Some(SlotState::Reserved) && holder == Some(booking.id),
            "Booking {} is {} but slot {} is {:?} held by {:?}",
            booking.id,
            booking.status,
            booking.slot,
            state,
            holder
        );
    } else {
        debug_assert!(
            holder != Some(booking.id),
            "Cancelled booking {} still holds slot {}",
            booking.id,
            booking.slot
        );
    }
}

/// Validate that a listing is publishable
pub fn assert_listing_invariants(listing: &Listing) {
    debug_assert!(
        listing.price_per_person.is_positive(),
        "Listing {} has non-positive price {}",
        listing.id,
        listing.price_per_person
    );

    debug_assert!(
        listing.owner_id != Uuid::nil(),
        "Listing {} has nil owner",
        listing.id
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorRole, Money, NewListing, Slot};
    use chrono::Utc;

    fn make_booking() -> Booking {
        let slot: Slot = "2025-12-10/19:00".parse().unwrap();
        Booking::new_pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            slot,
            4,
            None,
            Money::from_major(250),
            Money::from_major(1000),
            Utc::now(),
        )
    }

    #[test]
    fn test_valid_booking() {
        assert_booking_invariants(&make_booking());
    }

    #[test]
    #[should_panic(expected = "meal time")]
    fn test_meal_time_on_timed_slot_detected() {
        let mut booking = make_booking();
        booking.meal_time = booking.slot.time;
        assert_booking_invariants(&booking);
    }

    #[test]
    #[should_panic(expected = "total")]
    fn test_wrong_total_detected() {
        let mut booking = make_booking();
        booking.total_price = Money::from_major(999);
        assert_booking_invariants(&booking);
    }

    #[test]
    #[should_panic(expected = "cancelled_by")]
    fn test_cancelled_by_on_active_booking_detected() {
        let mut booking = make_booking();
        booking.cancelled_by = Some(ActorRole::Host);
        assert_booking_invariants(&booking);
    }

    #[test]
    fn test_slot_conservation() {
        let mut booking = make_booking();
        assert_slot_conservation(&booking, Some(SlotState::Reserved), Some(booking.id));

        booking.status = BookingStatus::Cancelled;
        assert_slot_conservation(&booking, Some(SlotState::Open), None);
    }

    #[test]
    #[should_panic(expected = "still holds slot")]
    fn test_cancelled_holder_detected() {
        let mut booking = make_booking();
        booking.status = BookingStatus::Cancelled;
        assert_slot_conservation(&booking, Some(SlotState::Reserved), Some(booking.id));
    }

    #[test]
    fn test_valid_listing() {
        let listing = NewListing::new("Famille Idrissi", "Casablanca", Money::from_major(200))
            .into_listing(Uuid::new_v4(), Utc::now());
        assert_listing_invariants(&listing);
    }
}
