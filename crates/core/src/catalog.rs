//! Catalog seed files
//!
//! A TOML file with one `[[listings]]` table per family:
//!
//! ```toml
//! [[listings]]
//! owner_id = "6f1c2a4e-0b7d-4c55-9a39-02d1f4a7b001"
//! family_name = "Famille Alami"
//! city = "Marrakech"
//! languages = ["Français", "Arabe", "Anglais"]
//! price = 250
//! rating = 4.8
//! review_count = 24
//! verified = true
//! slots = ["2025-12-05", "2025-12-10/19:00"]
//! ```
//!
//! `price` is per person in whole currency units. Slots use the
//! `YYYY-MM-DD[/HH:MM]` form.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::ConfigError;
use crate::error::{Error, Result};
use crate::models::{Listing, Money, NewListing, Slot};
use crate::service::ReservationService;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub listings: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Host account; a fresh id is assigned when absent
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    pub family_name: String,
    pub city: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub price: i64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub slots: Vec<String>,
}

impl CatalogEntry {
    /// Owner and onboarding payload for this entry
    pub fn to_new_listing(&self) -> Result<(Uuid, NewListing)> {
        let slots = self
            .slots
            .iter()
            .map(|s| s.parse::<Slot>())
            .collect::<Result<Vec<_>>>()?;

        let mut listing = NewListing::new(
            self.family_name.as_str(),
            self.city.as_str(),
            Money::from_major(self.price),
        )
        .with_languages(self.languages.iter().cloned())
        .with_rating(self.rating, self.review_count)
        .verified(self.verified)
        .with_slots(slots);
        listing.description = self.description.clone();

        Ok((self.owner_id.unwrap_or_else(Uuid::new_v4), listing))
    }
}

impl CatalogFile {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(ConfigError::from(e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Onboard every entry, in file order, into an empty catalog.
    /// A catalog that already has listings is left untouched.
    #[instrument(skip(self, service), fields(entries = self.listings.len()))]
    pub fn seed(&self, service: &ReservationService) -> Result<Vec<Listing>> {
        if !service.list_listings()?.is_empty() {
            info!("Catalog already populated, skipping seed");
            return Ok(Vec::new());
        }

        let mut seeded = Vec::with_capacity(self.listings.len());
        for entry in &self.listings {
            let (owner_id, new) = entry.to_new_listing()?;
            seeded.push(service.create_listing(owner_id, new)?);
        }

        info!(count = seeded.len(), "Catalog seeded");
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::matching::SearchConstraints;
    use crate::storage::Database;

    const DEMO: &str = r#"
[[listings]]
owner_id = "6f1c2a4e-0b7d-4c55-9a39-02d1f4a7b001"
family_name = "Famille Alami"
city = "Marrakech"
description = "Maison traditionnelle au coeur de la médina"
languages = ["Français", "Arabe", "Anglais"]
price = 250
rating = 4.8
review_count = 24
verified = true
slots = ["2025-12-05", "2025-12-10/19:00"]

[[listings]]
family_name = "Famille Idrissi"
city = "Casablanca"
languages = ["Français", "Arabe", "Anglais", "Espagnol"]
price = 200
rating = 4.6
review_count = 18
slots = ["2025-12-06", "2025-12-11"]
"#;

    fn service() -> ReservationService {
        ReservationService::new(Database::open_in_memory().unwrap(), EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = CatalogFile::from_toml(DEMO).unwrap();
        assert_eq!(catalog.listings.len(), 2);

        let (owner, alami) = catalog.listings[0].to_new_listing().unwrap();
        assert_eq!(owner.to_string(), "6f1c2a4e-0b7d-4c55-9a39-02d1f4a7b001");
        assert_eq!(alami.price_per_person, Money::from_major(250));
        assert!(alami.is_verified);
        assert_eq!(alami.availability.len(), 2);
    }

    #[test]
    fn test_seed_once() {
        let service = service();
        let catalog = CatalogFile::from_toml(DEMO).unwrap();

        assert_eq!(catalog.seed(&service).unwrap().len(), 2);
        assert!(catalog.seed(&service).unwrap().is_empty());

        let results = service
            .search(&SearchConstraints::new().speaking(["Espagnol"]))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].family_name, "Famille Idrissi");
    }

    #[test]
    fn test_demo_catalog_price_search() {
        let service = service();
        let catalog = CatalogFile::from_toml(include_str!("../../../demos/catalog.toml")).unwrap();
        assert_eq!(catalog.seed(&service).unwrap().len(), 5);

        let results = service
            .search(&SearchConstraints::new().price_between(Money::ZERO, Money::from_major(240)))
            .unwrap();
        let names: Vec<&str> = results.iter().map(|l| l.family_name.as_str()).collect();
        assert_eq!(names, ["Famille Idrissi", "Famille Chraibi"]);
    }

    #[test]
    fn test_bad_slot_rejected() {
        let bad = r#"
[[listings]]
family_name = "Famille Tazi"
city = "Rabat"
price = 280
slots = ["12/05/2025"]
"#;
        let catalog = CatalogFile::from_toml(bad).unwrap();
        assert!(matches!(
            catalog.listings[0].to_new_listing(),
            Err(Error::InvalidSlot(_))
        ));
    }

    #[test]
    fn test_missing_price_is_config_error() {
        let err = CatalogFile::from_toml("[[listings]]\nfamily_name = \"X\"\ncity = \"Y\"\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, DEMO).unwrap();
        assert_eq!(CatalogFile::load(&path).unwrap().listings.len(), 2);
    }
}
