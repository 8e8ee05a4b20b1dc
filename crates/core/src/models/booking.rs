//! Booking record and lifecycle vocabulary

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Money, Slot};

/// Booking status. `Cancelled` is terminal and covers refusals too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Active bookings hold their slot in the ledger
    pub fn is_active(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle trigger applied to an existing booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Accept,
    Refuse,
    Cancel,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::Accept => "accept",
            Transition::Refuse => "refuse",
            Transition::Cancel => "cancel",
        })
    }
}

/// Host decision on a pending booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Refuse,
}

impl From<Decision> for Transition {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => Transition::Accept,
            Decision::Refuse => Transition::Refuse,
        }
    }
}

/// Authenticated caller identity, supplied by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Guest(Uuid),
    Host(Uuid),
}

impl Actor {
    pub fn id(&self) -> Uuid {
        match self {
            Actor::Guest(id) | Actor::Host(id) => *id,
        }
    }

    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Guest(_) => ActorRole::Guest,
            Actor::Host(_) => ActorRole::Host,
        }
    }
}

/// Who triggered a transition (recorded on cancellation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Guest,
    Host,
    /// Automatic expiry of unanswered requests
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Guest => "guest",
            ActorRole::Host => "host",
            ActorRole::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guest" => Some(ActorRole::Guest),
            "host" => Some(ActorRole::Host),
            "system" => Some(ActorRole::System),
            _ => None,
        }
    }
}

/// Guest submission for a new booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub listing_id: Uuid,
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
    pub guests: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A reservation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Listing the booking targets
    pub listing_id: Uuid,
    pub guest_id: Uuid,
    /// Ledger slot the booking holds
    #[serde(flatten)]
    pub slot: Slot,
    /// Guest's chosen time when the held slot covers the whole day
    #[serde(default, with = "super::slot::hhmm_opt")]
    pub meal_time: Option<NaiveTime>,
    pub guests: u32,
    pub notes: Option<String>,
    pub status: BookingStatus,
    /// Price snapshot taken at creation
    pub price_per_person: Money,
    pub total_price: Money,
    pub cancelled_by: Option<ActorRole>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new_pending(
        listing_id: Uuid,
        guest_id: Uuid,
        slot: Slot,
        guests: u32,
        notes: Option<String>,
        price_per_person: Money,
        total_price: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            listing_id,
            guest_id,
            slot,
            meal_time: None,
            guests,
            notes,
            status: BookingStatus::Pending,
            price_per_person,
            total_price,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the guest's time on a whole-day slot. Ignored for timed slots.
    pub fn with_meal_time(mut self, time: Option<NaiveTime>) -> Self {
        if self.slot.time.is_none() {
            self.meal_time = time;
        }
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.slot.date
    }

    /// Time of the meal: the slot's own time, else the guest's choice
    pub fn time(&self) -> Option<NaiveTime> {
        self.slot.time.or(self.meal_time)
    }

    /// When the meal starts; `default_time` applies when no time is known
    pub fn starts_at(&self, default_time: NaiveTime) -> NaiveDateTime {
        self.slot.date.and_time(self.time().unwrap_or(default_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("refused"), None);
    }

    #[test]
    fn test_actor_serde_shape() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(Actor::Host(id)).unwrap();
        assert_eq!(json["role"], "host");
        assert_eq!(json["id"], id.to_string());
    }

    #[test]
    fn test_booking_json_flattens_slot() {
        let slot: Slot = "2025-12-10/19:00".parse().unwrap();
        let booking = Booking::new_pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            slot,
            4,
            None,
            Money::from_major(250),
            Money::from_major(1000),
            Utc::now(),
        );
        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["date"], "2025-12-10");
        assert_eq!(json["time"], "19:00");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["total_price"], 100_000);
        assert!(json["meal_time"].is_null());
    }

    #[test]
    fn test_meal_time_on_whole_day_slot() {
        let eight = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
        let seven = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
        let on = |slot: &str| {
            Booking::new_pending(
                Uuid::new_v4(),
                Uuid::new_v4(),
                slot.parse().unwrap(),
                2,
                None,
                Money::from_major(200),
                Money::from_major(400),
                Utc::now(),
            )
        };

        let whole_day = on("2025-12-08").with_meal_time(Some(eight));
        assert_eq!(whole_day.time(), Some(eight));
        assert_eq!(whole_day.starts_at(seven).to_string(), "2025-12-08 20:00:00");
        assert_eq!(serde_json::to_value(&whole_day).unwrap()["meal_time"], "20:00");

        let timed = on("2025-12-08/19:00").with_meal_time(Some(eight));
        assert_eq!(timed.meal_time, None);
        assert_eq!(timed.time(), Some(seven));

        assert_eq!(on("2025-12-08").starts_at(seven).to_string(), "2025-12-08 19:00:00");
    }
}
