//! Reservation orchestrator
//!
//! `ReservationService` owns the store and is the only writer of catalog,
//! slot and booking state. Each write runs in one immediate transaction
//! under the store mutex, so a slot and the booking holding it always change
//! together. Events go out after commit.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime, NaiveTime};
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, NoopSink};
use crate::invariants::assert_listing_invariants;
use crate::lifecycle::BookingMachine;
use crate::matching::{self, SearchConstraints};
use crate::models::{
    Actor, ActorRole, Booking, BookingRequest, BookingStatus, Decision, DomainEvent, Listing,
    ListingSummary, Money, NewListing, Slot, Transition,
};
use crate::storage::{AvailabilityLedger, BookingStore, Database, ListingStore, SlotState};

/// Longest accepted booking note, in characters
pub const MAX_NOTES_LEN: usize = 1000;

/// Calendar edit on a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityOp {
    Add,
    Remove,
}

pub struct ReservationService {
    db: Mutex<Database>,
    config: EngineConfig,
    slot_time: NaiveTime,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl ReservationService {
    /// Take ownership of an opened store
    pub fn new(db: Database, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let slot_time = config.slot_start_time()?;

        Ok(Self {
            db: Mutex::new(db),
            config,
            slot_time,
            clock: Arc::new(SystemClock),
            events: Arc::new(NoopSink),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Release the store
    pub fn close(self) -> Result<()> {
        let db = self.db.into_inner().unwrap_or_else(|e| e.into_inner());
        db.close()
    }

    // ==================== Catalog ====================

    #[instrument(skip(self))]
    pub fn get_listing(&self, listing_id: Uuid) -> Result<Listing> {
        self.read(|conn| {
            ListingStore::new(conn)
                .find_by_id(listing_id)?
                .ok_or_else(|| listing_not_found(listing_id))
        })
    }

    pub fn list_listings(&self) -> Result<Vec<Listing>> {
        self.read(|conn| ListingStore::new(conn).list())
    }

    /// Search the latest catalog snapshot
    #[instrument(skip(self, constraints))]
    pub fn search(&self, constraints: &SearchConstraints) -> Result<Vec<ListingSummary>> {
        constraints.validate()?;
        let catalog = self.list_listings()?;
        let results = matching::search(&catalog, constraints);
        debug!(matched = results.len(), of = catalog.len(), "Search");
        Ok(results.iter().map(Listing::summary).collect())
    }

    /// Onboard a listing for `owner_id` with its initial calendar
    #[instrument(skip(self, new), fields(family = %new.family_name))]
    pub fn create_listing(&self, owner_id: Uuid, new: NewListing) -> Result<Listing> {
        new.validate()?;
        let listing = new.into_listing(owner_id, self.clock.now());
        assert_listing_invariants(&listing);
        self.write(|tx| ListingStore::new(tx).create(&listing))?;
        info!(listing_id = %listing.id, %owner_id, "Listing created");
        Ok(listing)
    }

    /// Change the per-person price. Existing bookings keep their totals.
    #[instrument(skip(self))]
    pub fn update_price(&self, listing_id: Uuid, price: Money) -> Result<Listing> {
        if !price.is_positive() {
            return Err(Error::Validation(format!(
                "price per person must be positive, got {}",
                price
            )));
        }
        self.write(|tx| {
            let store = ListingStore::new(tx);
            if !store.update_price(listing_id, price)? {
                return Err(listing_not_found(listing_id));
            }
            store
                .find_by_id(listing_id)?
                .ok_or_else(|| listing_not_found(listing_id))
        })
    }

    /// KYC callback: record the host's verification outcome
    #[instrument(skip(self))]
    pub fn set_host_verified(&self, listing_id: Uuid, verified: bool) -> Result<Listing> {
        let listing = self.write(|tx| {
            let store = ListingStore::new(tx);
            if !store.set_verified(listing_id, verified)? {
                return Err(listing_not_found(listing_id));
            }
            store
                .find_by_id(listing_id)?
                .ok_or_else(|| listing_not_found(listing_id))
        })?;
        info!(%listing_id, verified, "Host verification updated");
        Ok(listing)
    }

    /// Add or remove an open slot. Returns false when the calendar already
    /// had (or lacked) the slot. Past and malformed slots are `InvalidSlot`.
    #[instrument(skip(self))]
    pub fn mutate_availability(
        &self,
        listing_id: Uuid,
        op: AvailabilityOp,
        date: &str,
        time: Option<&str>,
    ) -> Result<bool> {
        let slot = Slot::parse(date, time)?;
        if slot.is_past(self.local_now()) {
            return Err(Error::InvalidSlot(format!("{} is in the past", slot)));
        }

        self.write(|tx| {
            if !ListingStore::new(tx).exists(listing_id)? {
                return Err(listing_not_found(listing_id));
            }
            let ledger = AvailabilityLedger::new(tx);
            match op {
                AvailabilityOp::Add => ledger.add_slot(listing_id, &slot),
                AvailabilityOp::Remove => ledger.remove_slot(listing_id, &slot),
            }
        })
    }

    /// Remove a listing that no booking has ever referenced
    #[instrument(skip(self))]
    pub fn delete_listing(&self, listing_id: Uuid) -> Result<()> {
        self.write(|tx| {
            if BookingStore::new(tx).count_for_listing(listing_id)? > 0 {
                return Err(Error::ListingInUse(listing_id));
            }
            if !ListingStore::new(tx).delete(listing_id)? {
                return Err(listing_not_found(listing_id));
            }
            Ok(())
        })?;
        info!(%listing_id, "Listing deleted");
        Ok(())
    }

    pub fn slot_state(&self, listing_id: Uuid, slot: &Slot) -> Result<Option<SlotState>> {
        self.read(|conn| AvailabilityLedger::new(conn).slot_state(listing_id, slot))
    }

    // ==================== Bookings ====================

    /// Reserve the requested slot and record a pending booking. A time on
    /// a whole-day slot is kept as the booking's meal time.
    /// A lost race is `SlotUnavailable` and leaves nothing behind.
    #[instrument(skip(self, request), fields(listing_id = %request.listing_id, guests = request.guests))]
    pub fn create_booking(&self, actor: Actor, request: BookingRequest) -> Result<Booking> {
        let Actor::Guest(guest_id) = actor else {
            return Err(Error::Forbidden("only guests can request bookings".into()));
        };

        if !(1..=self.config.max_guests).contains(&request.guests) {
            return Err(Error::Validation(format!(
                "guests must be between 1 and {}, got {}",
                self.config.max_guests, request.guests
            )));
        }

        let slot = Slot::parse(&request.date, request.time.as_deref())?;
        if slot.is_past(self.local_now()) {
            return Err(Error::InvalidSlot(format!("{} is in the past", slot)));
        }

        let notes = request
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
            return Err(Error::Validation(format!(
                "notes must be at most {} characters",
                MAX_NOTES_LEN
            )));
        }

        let now = self.clock.now();
        let booking = self.write(|tx| {
            let listing = ListingStore::new(tx)
                .find_by_id(request.listing_id)?
                .ok_or_else(|| listing_not_found(request.listing_id))?;

            if self.config.require_verified_hosts && !listing.is_verified {
                return Err(Error::Forbidden(format!(
                    "host of listing {} is not verified",
                    listing.id
                )));
            }

            let total = listing
                .price_per_person
                .checked_times(request.guests)
                .ok_or_else(|| Error::Validation("total price out of range".into()))?;

            let held = AvailabilityLedger::new(tx).backing_slot(listing.id, &slot)?;
            let booking = Booking::new_pending(
                listing.id,
                guest_id,
                held,
                request.guests,
                notes,
                listing.price_per_person,
                total,
                now,
            )
            .with_meal_time(slot.time);
            BookingMachine::new(tx).open(&booking)?;
            Ok(booking)
        })?;

        info!(booking_id = %booking.id, %guest_id, total = %booking.total_price, "Booking requested");
        self.publish(&booking);
        Ok(booking)
    }

    /// Host accepts or refuses a pending booking on one of its listings
    #[instrument(skip(self))]
    pub fn decide(&self, actor: Actor, booking_id: Uuid, decision: Decision) -> Result<Booking> {
        let Actor::Host(host_id) = actor else {
            return Err(Error::Forbidden("only hosts can decide on bookings".into()));
        };

        let booking = self.write(|tx| {
            let booking = find_booking(tx, booking_id)?;
            ensure_host_owns(tx, host_id, &booking)?;
            BookingMachine::new(tx).apply(
                &booking,
                Transition::from(decision),
                ActorRole::Host,
                self.clock.now(),
            )
        })?;

        self.publish(&booking);
        Ok(booking)
    }

    /// Cancel as the booking's guest or the listing's host. Guests lose the
    /// right to cancel a confirmed booking inside the cutoff window.
    #[instrument(skip(self))]
    pub fn cancel(&self, actor: Actor, booking_id: Uuid) -> Result<Booking> {
        let booking = self.write(|tx| {
            let booking = find_booking(tx, booking_id)?;
            match actor {
                Actor::Guest(guest_id) if guest_id != booking.guest_id => {
                    return Err(Error::Forbidden(format!(
                        "booking {} belongs to another guest",
                        booking.id
                    )));
                }
                Actor::Guest(_) => self.ensure_cancellable(&booking)?,
                Actor::Host(host_id) => ensure_host_owns(tx, host_id, &booking)?,
            }

            BookingMachine::new(tx).apply(
                &booking,
                Transition::Cancel,
                actor.role(),
                self.clock.now(),
            )
        })?;

        self.publish(&booking);
        Ok(booking)
    }

    /// A booking, visible to its guest and to the listing's host
    #[instrument(skip(self))]
    pub fn get_booking(&self, actor: Actor, booking_id: Uuid) -> Result<Booking> {
        self.read(|conn| {
            let booking = find_booking(conn, booking_id)?;
            match actor {
                Actor::Guest(guest_id) if guest_id == booking.guest_id => Ok(booking),
                Actor::Guest(_) => Err(Error::Forbidden(format!(
                    "booking {} belongs to another guest",
                    booking.id
                ))),
                Actor::Host(host_id) => {
                    ensure_host_owns(conn, host_id, &booking)?;
                    Ok(booking)
                }
            }
        })
    }

    /// The caller's dashboard: a guest's own bookings, or every booking on
    /// a host's listings. Newest first.
    pub fn bookings_for(&self, actor: Actor) -> Result<Vec<Booking>> {
        self.read(|conn| {
            let store = BookingStore::new(conn);
            match actor {
                Actor::Guest(id) => store.list_for_guest(id),
                Actor::Host(id) => store.list_for_owner(id),
            }
        })
    }

    /// Cancel pending bookings the host left unanswered for longer than
    /// `pending_expiry_hours`. Does nothing when expiry is disabled.
    #[instrument(skip(self))]
    pub fn expire_pending(&self) -> Result<Vec<Booking>> {
        let Some(hours) = self.config.pending_expiry_hours else {
            return Ok(Vec::new());
        };

        let now = self.clock.now();
        let Some(cutoff) = now.checked_sub_signed(Duration::hours(i64::from(hours))) else {
            return Ok(Vec::new());
        };

        let expired = self.write(|tx| {
            let machine = BookingMachine::new(tx);
            BookingStore::new(tx)
                .list_pending_before(cutoff)?
                .iter()
                .map(|booking| machine.apply(booking, Transition::Cancel, ActorRole::System, now))
                .collect::<Result<Vec<_>>>()
        })?;

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired unanswered bookings");
        }
        for booking in &expired {
            self.publish(booking);
        }
        Ok(expired)
    }

    // ==================== Internals ====================

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|e| {
            warn!("Store mutex poisoned, recovering");
            e.into_inner()
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let db = self.lock();
        f(db.connection())
    }

    /// Run `f` in one immediate transaction; any error rolls everything back
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let db = self.lock();
        let tx = db.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Wall-clock time at the listings' location
    fn local_now(&self) -> NaiveDateTime {
        (self.clock.now() + Duration::minutes(i64::from(self.config.utc_offset_minutes)))
            .naive_utc()
    }

    fn ensure_cancellable(&self, booking: &Booking) -> Result<()> {
        let cutoff_hours = self.config.cancellation_cutoff_hours;
        if booking.status != BookingStatus::Confirmed || cutoff_hours == 0 {
            return Ok(());
        }

        let starts_at = booking.starts_at(self.slot_time);
        if starts_at - self.local_now() < Duration::hours(i64::from(cutoff_hours)) {
            return Err(Error::CancellationClosed {
                booking_id: booking.id,
                cutoff_hours,
            });
        }
        Ok(())
    }

    fn publish(&self, booking: &Booking) {
        self.events.publish(DomainEvent::for_booking(booking));
    }
}

fn listing_not_found(id: Uuid) -> Error {
    Error::NotFound(format!("listing {}", id))
}

fn find_booking(conn: &Connection, id: Uuid) -> Result<Booking> {
    BookingStore::new(conn)
        .find_by_id(id)?
        .ok_or_else(|| Error::NotFound(format!("booking {}", id)))
}

fn ensure_host_owns(conn: &Connection, host_id: Uuid, booking: &Booking) -> Result<()> {
    let owner = ListingStore::new(conn)
        .owner_of(booking.listing_id)?
        .ok_or_else(|| listing_not_found(booking.listing_id))?;

    if owner != host_id {
        return Err(Error::Forbidden(format!(
            "listing {} belongs to another host",
            booking.listing_id
        )));
    }
    Ok(())
}
