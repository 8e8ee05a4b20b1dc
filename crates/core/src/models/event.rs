//! Domain events emitted for the notification collaborator

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Booking, BookingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
}

/// A booking lifecycle event. Delivery and formatting happen elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub booking_id: Uuid,
    /// Listing the booking targets
    pub host_id: Uuid,
    pub guest_id: Uuid,
    pub status: BookingStatus,
}

impl DomainEvent {
    /// Event describing the booking's current status
    pub fn for_booking(booking: &Booking) -> Self {
        let kind = match booking.status {
            BookingStatus::Pending => EventKind::BookingCreated,
            BookingStatus::Confirmed => EventKind::BookingConfirmed,
            BookingStatus::Cancelled => EventKind::BookingCancelled,
        };

        Self {
            kind,
            booking_id: booking.id,
            host_id: booking.listing_id,
            guest_id: booking.guest_id,
            status: booking.status,
        }
    }
}
