//! Listing catalog storage operations

use std::collections::{BTreeSet, HashMap};

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::ledger::AvailabilityLedger;
use super::parse::{parse_datetime, parse_slot, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Listing, Money, Slot};

const LISTING_COLUMNS: &str = "id, owner_id, family_name, city, description, price_minor, rating, review_count, is_verified, created_at";

pub struct ListingStore<'a> {
    conn: &'a Connection,
}

impl<'a> ListingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a listing with its languages and initial open slots
    #[instrument(skip(self, listing), fields(listing_id = %listing.id, family = %listing.family_name))]
    pub fn create(&self, listing: &Listing) -> Result<()> {
        self.conn.execute(
            "INSERT INTO listings (id, owner_id, family_name, city, description, price_minor, rating, review_count, is_verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                listing.id.to_string(),
                listing.owner_id.to_string(),
                listing.family_name,
                listing.city,
                listing.description,
                listing.price_per_person.minor(),
                listing.rating,
                listing.review_count,
                listing.is_verified as i32,
                listing.created_at.to_rfc3339(),
            ],
        )?;

        for language in &listing.languages {
            self.conn.execute(
                "INSERT OR IGNORE INTO listing_languages (listing_id, language) VALUES (?1, ?2)",
                params![listing.id.to_string(), language],
            )?;
        }

        let ledger = AvailabilityLedger::new(self.conn);
        for slot in &listing.availability {
            ledger.add_slot(listing.id, slot)?;
        }

        Ok(())
    }

    /// Find a listing by ID, with its currently open slots
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM listings WHERE id = ?1",
            LISTING_COLUMNS
        ))?;

        let listing = stmt
            .query_row(params![id.to_string()], listing_from_row)
            .optional()?;

        let Some(mut listing) = listing else {
            return Ok(None);
        };

        listing.languages = self.languages_for(id)?;
        listing.availability = AvailabilityLedger::new(self.conn).open_slots(id)?;
        Ok(Some(listing))
    }

    /// Whether a listing exists
    pub fn exists(&self, id: Uuid) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Host account owning a listing
    pub fn owner_of(&self, id: Uuid) -> Result<Option<Uuid>> {
        let owner = self
            .conn
            .query_row(
                "SELECT owner_id FROM listings WHERE id = ?1",
                params![id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(owner.as_deref().map(parse_uuid).transpose()?)
    }

    /// List every listing in catalog insertion order
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Listing>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM listings ORDER BY seq",
            LISTING_COLUMNS
        ))?;

        let mut listings = stmt
            .query_map([], listing_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut languages = self.all_languages()?;
        let mut slots = self.all_open_slots()?;

        for listing in &mut listings {
            listing.languages = languages.remove(&listing.id).unwrap_or_default();
            listing.availability = slots.remove(&listing.id).unwrap_or_default();
        }

        Ok(listings)
    }

    /// Set the price used for future bookings
    #[instrument(skip(self))]
    pub fn update_price(&self, id: Uuid, price: Money) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE listings SET price_minor = ?1 WHERE id = ?2",
            params![price.minor(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Record the external KYC outcome
    #[instrument(skip(self))]
    pub fn set_verified(&self, id: Uuid, is_verified: bool) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE listings SET is_verified = ?1 WHERE id = ?2",
            params![is_verified as i32, id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Delete a listing (languages and slots cascade)
    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM listings WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    fn languages_for(&self, id: Uuid) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT language FROM listing_languages WHERE listing_id = ?1")?;

        let languages = stmt
            .query_map(params![id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;

        Ok(languages)
    }

    fn all_languages(&self) -> Result<HashMap<Uuid, BTreeSet<String>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT listing_id, language FROM listing_languages")?;

        let mut map: HashMap<Uuid, BTreeSet<String>> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                parse_uuid(&row.get::<_, String>(0)?)?,
                row.get::<_, String>(1)?,
            ))
        })?;
        for row in rows {
            let (id, language) = row?;
            map.entry(id).or_default().insert(language);
        }

        Ok(map)
    }

    fn all_open_slots(&self) -> Result<HashMap<Uuid, BTreeSet<Slot>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT listing_id, slot_date, slot_time FROM slots WHERE state = 'open'")?;

        let mut map: HashMap<Uuid, BTreeSet<Slot>> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                parse_uuid(&row.get::<_, String>(0)?)?,
                parse_slot(&row.get::<_, String>(1)?, &row.get::<_, String>(2)?)?,
            ))
        })?;
        for row in rows {
            let (id, slot) = row?;
            map.entry(id).or_default().insert(slot);
        }

        Ok(map)
    }
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    Ok(Listing {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        owner_id: parse_uuid(&row.get::<_, String>(1)?)?,
        family_name: row.get(2)?,
        city: row.get(3)?,
        description: row.get(4)?,
        price_per_person: Money::from_minor(row.get(5)?),
        rating: row.get(6)?,
        review_count: row.get(7)?,
        is_verified: row.get::<_, i32>(8)? != 0,
        created_at: parse_datetime(&row.get::<_, String>(9)?)?,
        languages: BTreeSet::new(),
        availability: BTreeSet::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewListing;
    use crate::storage::Database;
    use chrono::Utc;

    fn sample(name: &str, price: i64) -> Listing {
        NewListing::new(name, "Marrakech", Money::from_major(price))
            .with_languages(["Français", "Arabe"])
            .with_rating(4.8, 24)
            .with_slots(["2025-12-05".parse().unwrap(), "2025-12-10/19:00".parse().unwrap()])
            .into_listing(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let listing = sample("Famille Alami", 250);
        db.listings().create(&listing).unwrap();

        let found = db.listings().find_by_id(listing.id).unwrap().unwrap();
        assert_eq!(found.family_name, "Famille Alami");
        assert_eq!(found.price_per_person, Money::from_major(250));
        assert_eq!(found.languages.len(), 2);
        assert_eq!(found.availability.len(), 2);
        assert!(db.listings().exists(listing.id).unwrap());
    }

    #[test]
    fn test_find_missing() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.listings().find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let names = ["Famille Tazi", "Famille Alami", "Famille Bennani"];
        for (i, name) in names.iter().enumerate() {
            db.listings().create(&sample(name, 200 + i as i64)).unwrap();
        }

        let listed: Vec<String> = db
            .listings()
            .list()
            .unwrap()
            .into_iter()
            .map(|l| l.family_name)
            .collect();
        assert_eq!(listed, names);
    }

    #[test]
    fn test_update_price_and_verification() {
        let db = Database::open_in_memory().unwrap();
        let listing = sample("Famille Chraibi", 220);
        db.listings().create(&listing).unwrap();

        assert!(db.listings().update_price(listing.id, Money::from_major(240)).unwrap());
        assert!(db.listings().set_verified(listing.id, true).unwrap());
        assert!(!db.listings().update_price(Uuid::new_v4(), Money::from_major(1)).unwrap());

        let found = db.listings().find_by_id(listing.id).unwrap().unwrap();
        assert_eq!(found.price_per_person, Money::from_major(240));
        assert!(found.is_verified);
    }

    #[test]
    fn test_delete_cascades_slots() {
        let db = Database::open_in_memory().unwrap();
        let listing = sample("Famille Idrissi", 200);
        db.listings().create(&listing).unwrap();

        assert!(db.listings().delete(listing.id).unwrap());
        assert!(db.ledger().open_slots(listing.id).unwrap().is_empty());
    }
}
