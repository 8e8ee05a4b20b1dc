//! Availability ledger
//!
//! Single source of truth for slot state. Each (listing, slot) pair is
//! either `open` or `reserved` by exactly one booking. Both transitions are
//! single conditional UPDATEs, so concurrent callers on the same pair see
//! exactly one winner.

use std::collections::BTreeSet;
use std::fmt;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::parse::{parse_slot, parse_uuid, OptionalExt};
use crate::error::{Error, Result};
use crate::models::Slot;

/// Ledger state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Open,
    Reserved,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Open => "open",
            SlotState::Reserved => "reserved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(SlotState::Open),
            "reserved" => Some(SlotState::Reserved),
            _ => None,
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct AvailabilityLedger<'a> {
    conn: &'a Connection,
}

impl<'a> AvailabilityLedger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Add an open slot. Returns false if the slot already exists.
    #[instrument(skip(self), fields(slot = %slot))]
    pub fn add_slot(&self, listing_id: Uuid, slot: &Slot) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO slots (listing_id, slot_date, slot_time, state)
             VALUES (?1, ?2, ?3, 'open')",
            params![listing_id.to_string(), slot.date_key(), slot.time_key()],
        )?;
        Ok(inserted > 0)
    }

    /// Remove an open slot. Returns false if the slot does not exist;
    /// a reserved slot cannot be removed.
    #[instrument(skip(self), fields(slot = %slot))]
    pub fn remove_slot(&self, listing_id: Uuid, slot: &Slot) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM slots
             WHERE listing_id = ?1 AND slot_date = ?2 AND slot_time = ?3 AND state = 'open'",
            params![listing_id.to_string(), slot.date_key(), slot.time_key()],
        )?;
        if deleted > 0 {
            return Ok(true);
        }

        match self.slot_state(listing_id, slot)? {
            Some(SlotState::Reserved) => Err(Error::SlotUnavailable {
                listing_id,
                slot: *slot,
            }),
            _ => Ok(false),
        }
    }

    /// Current state of a slot, `None` if the listing has no such slot
    pub fn slot_state(&self, listing_id: Uuid, slot: &Slot) -> Result<Option<SlotState>> {
        let state = self
            .conn
            .query_row(
                "SELECT state FROM slots
                 WHERE listing_id = ?1 AND slot_date = ?2 AND slot_time = ?3",
                params![listing_id.to_string(), slot.date_key(), slot.time_key()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(state.as_deref().and_then(SlotState::parse))
    }

    /// Calendar slot that would back a booking at `requested`. A timed
    /// request on a date the calendar only lists as a whole day is backed
    /// by the whole-day slot; otherwise slots match exactly.
    pub fn backing_slot(&self, listing_id: Uuid, requested: &Slot) -> Result<Slot> {
        if requested.time.is_none() || self.slot_state(listing_id, requested)?.is_some() {
            return Ok(*requested);
        }

        let whole_day = Slot::new(requested.date, None);
        match self.slot_state(listing_id, &whole_day)? {
            Some(_) => Ok(whole_day),
            None => Ok(*requested),
        }
    }

    /// Booking currently holding a slot
    pub fn holder(&self, listing_id: Uuid, slot: &Slot) -> Result<Option<Uuid>> {
        let holder = self
            .conn
            .query_row(
                "SELECT booking_id FROM slots
                 WHERE listing_id = ?1 AND slot_date = ?2 AND slot_time = ?3",
                params![listing_id.to_string(), slot.date_key(), slot.time_key()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        holder.as_deref().map(parse_uuid).transpose().map_err(Error::from)
    }

    /// Open slots of a listing, in calendar order
    pub fn open_slots(&self, listing_id: Uuid) -> Result<BTreeSet<Slot>> {
        let mut stmt = self.conn.prepare(
            "SELECT slot_date, slot_time FROM slots WHERE listing_id = ?1 AND state = 'open'",
        )?;

        let slots = stmt
            .query_map(params![listing_id.to_string()], |row| {
                parse_slot(&row.get::<_, String>(0)?, &row.get::<_, String>(1)?)
            })?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;

        Ok(slots)
    }

    /// open -> reserved on behalf of `booking_id`
    #[instrument(skip(self), fields(slot = %slot))]
    pub fn reserve(&self, listing_id: Uuid, slot: &Slot, booking_id: Uuid) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE slots SET state = 'reserved', booking_id = ?4
             WHERE listing_id = ?1 AND slot_date = ?2 AND slot_time = ?3 AND state = 'open'",
            params![
                listing_id.to_string(),
                slot.date_key(),
                slot.time_key(),
                booking_id.to_string(),
            ],
        )?;

        if updated == 0 {
            debug!(%listing_id, slot = %slot, "Reserve lost: slot not open");
            return Err(Error::SlotUnavailable {
                listing_id,
                slot: *slot,
            });
        }

        Ok(())
    }

    /// reserved -> open; only the booking holding the slot may release it
    #[instrument(skip(self), fields(slot = %slot))]
    pub fn release(&self, listing_id: Uuid, slot: &Slot, booking_id: Uuid) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE slots SET state = 'open', booking_id = NULL
             WHERE listing_id = ?1 AND slot_date = ?2 AND slot_time = ?3
               AND state = 'reserved' AND booking_id = ?4",
            params![
                listing_id.to_string(),
                slot.date_key(),
                slot.time_key(),
                booking_id.to_string(),
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotReserved {
                listing_id,
                slot: *slot,
            });
        }

        Ok(())
    }
}
