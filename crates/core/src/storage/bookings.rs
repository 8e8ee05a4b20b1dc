//! Booking storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    parse_datetime, parse_role_opt, parse_slot, parse_status, parse_time_opt, parse_uuid,
    OptionalExt,
};
use crate::error::Result;
use crate::models::{ActorRole, Booking, BookingStatus, Money, TIME_FORMAT};

const BOOKING_COLUMNS: &str = "b.id, b.listing_id, b.guest_id, b.slot_date, b.slot_time, b.guests, b.notes, b.status, b.price_per_person_minor, b.total_price_minor, b.cancelled_by, b.created_at, b.updated_at, b.meal_time";

pub struct BookingStore<'a> {
    conn: &'a Connection,
}

impl<'a> BookingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new booking record
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, listing_id = %booking.listing_id))]
    pub fn create(&self, booking: &Booking) -> Result<()> {
        self.conn.execute(
            "INSERT INTO bookings (id, listing_id, guest_id, slot_date, slot_time, guests, notes, status, price_per_person_minor, total_price_minor, cancelled_by, created_at, updated_at, meal_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                booking.id.to_string(),
                booking.listing_id.to_string(),
                booking.guest_id.to_string(),
                booking.slot.date_key(),
                booking.slot.time_key(),
                booking.guests,
                booking.notes,
                booking.status.as_str(),
                booking.price_per_person.minor(),
                booking.total_price.minor(),
                booking.cancelled_by.map(|r| r.as_str()),
                booking.created_at.to_rfc3339(),
                booking.updated_at.to_rfc3339(),
                booking.meal_time.map(|t| t.format(TIME_FORMAT).to_string()),
            ],
        )?;
        Ok(())
    }

    /// Find booking by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bookings b WHERE b.id = ?1",
            BOOKING_COLUMNS
        ))?;

        let booking = stmt
            .query_row(params![id.to_string()], booking_from_row)
            .optional()?;

        Ok(booking)
    }

    /// Move a booking from `from` to `to`. Returns false when the stored
    /// status is no longer `from`, leaving the row untouched.
    #[instrument(skip(self))]
    pub fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        cancelled_by: Option<ActorRole>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE bookings SET status = ?1, cancelled_by = COALESCE(?2, cancelled_by), updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                to.as_str(),
                cancelled_by.map(|r| r.as_str()),
                now.to_rfc3339(),
                id.to_string(),
                from.as_str(),
            ],
        )?;
        Ok(updated > 0)
    }

    /// Bookings made by a guest, newest first
    #[instrument(skip(self))]
    pub fn list_for_guest(&self, guest_id: Uuid) -> Result<Vec<Booking>> {
        self.query_list(
            &format!(
                "SELECT {} FROM bookings b WHERE b.guest_id = ?1 ORDER BY b.created_at DESC",
                BOOKING_COLUMNS
            ),
            guest_id,
        )
    }

    /// Bookings on any listing owned by a host account, newest first
    #[instrument(skip(self))]
    pub fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Booking>> {
        self.query_list(
            &format!(
                "SELECT {} FROM bookings b
                 INNER JOIN listings l ON l.id = b.listing_id
                 WHERE l.owner_id = ?1
                 ORDER BY b.created_at DESC",
                BOOKING_COLUMNS
            ),
            owner_id,
        )
    }

    /// Pending bookings created before `cutoff`, oldest first
    #[instrument(skip(self))]
    pub fn list_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bookings b
             WHERE b.status = 'pending' AND b.created_at < ?1
             ORDER BY b.created_at",
            BOOKING_COLUMNS
        ))?;

        let bookings = stmt
            .query_map(params![cutoff.to_rfc3339()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bookings)
    }

    /// Number of bookings (any status) referencing a listing
    pub fn count_for_listing(&self, listing_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE listing_id = ?1",
            params![listing_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn query_list(&self, sql: &str, id: Uuid) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(sql)?;
        let bookings = stmt
            .query_map(params![id.to_string()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }
}

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        listing_id: parse_uuid(&row.get::<_, String>(1)?)?,
        guest_id: parse_uuid(&row.get::<_, String>(2)?)?,
        slot: parse_slot(&row.get::<_, String>(3)?, &row.get::<_, String>(4)?)?,
        guests: row.get(5)?,
        notes: row.get(6)?,
        status: parse_status(&row.get::<_, String>(7)?)?,
        price_per_person: Money::from_minor(row.get(8)?),
        total_price: Money::from_minor(row.get(9)?),
        cancelled_by: parse_role_opt(row.get::<_, Option<String>>(10)?)?,
        created_at: parse_datetime(&row.get::<_, String>(11)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(12)?)?,
        meal_time: parse_time_opt(row.get::<_, Option<String>>(13)?)?,
    })
}
