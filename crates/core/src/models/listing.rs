//! Host listing model

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Money, Slot};
use crate::error::{Error, Result};

/// Highest rating a listing can carry
pub const MAX_RATING: f64 = 5.0;

/// A host family's meal offering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    /// Host account that owns the listing (supplied by auth)
    pub owner_id: Uuid,
    pub family_name: String,
    pub city: String,
    pub description: Option<String>,
    pub languages: BTreeSet<String>,
    pub price_per_person: Money,
    pub rating: f64,
    pub review_count: u32,
    /// Mirrors the external KYC outcome; read-only for the engine
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    /// Slots currently open for reservation
    pub availability: BTreeSet<Slot>,
}

impl Listing {
    pub fn speaks_any(&self, wanted: &BTreeSet<String>) -> bool {
        if wanted.is_empty() {
            return true;
        }

        let spoken: BTreeSet<String> = self.languages.iter().map(|l| fold(l)).collect();
        wanted.iter().any(|w| spoken.contains(&fold(w)))
    }

    pub fn has_open_slots(&self) -> bool {
        !self.availability.is_empty()
    }

    pub fn summary(&self) -> ListingSummary {
        ListingSummary::from(self)
    }
}

/// Case-folded form used for language comparison
fn fold(language: &str) -> String {
    language.trim().to_lowercase()
}

/// Search-facing projection of a listing; hides calendar detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: Uuid,
    pub family_name: String,
    pub city: String,
    pub languages: BTreeSet<String>,
    pub price_per_person: Money,
    pub rating: f64,
    pub review_count: u32,
    pub is_verified: bool,
    pub has_open_slots: bool,
}

impl From<&Listing> for ListingSummary {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id,
            family_name: listing.family_name.clone(),
            city: listing.city.clone(),
            languages: listing.languages.clone(),
            price_per_person: listing.price_per_person,
            rating: listing.rating,
            review_count: listing.review_count,
            is_verified: listing.is_verified,
            has_open_slots: listing.has_open_slots(),
        }
    }
}

/// Listing data captured at the end of host onboarding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub family_name: String,
    pub city: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub languages: BTreeSet<String>,
    pub price_per_person: Money,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub availability: BTreeSet<Slot>,
}

impl NewListing {
    pub fn new(family_name: impl Into<String>, city: impl Into<String>, price: Money) -> Self {
        Self {
            family_name: family_name.into(),
            city: city.into(),
            description: None,
            languages: BTreeSet::new(),
            price_per_person: price,
            rating: 0.0,
            review_count: 0,
            is_verified: false,
            availability: BTreeSet::new(),
        }
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rating(mut self, rating: f64, review_count: u32) -> Self {
        self.rating = rating;
        self.review_count = review_count;
        self
    }

    pub fn verified(mut self, is_verified: bool) -> Self {
        self.is_verified = is_verified;
        self
    }

    pub fn with_slots<I: IntoIterator<Item = Slot>>(mut self, slots: I) -> Self {
        self.availability = slots.into_iter().collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.family_name.trim().is_empty() {
            return Err(Error::Validation("family name must not be empty".into()));
        }
        if self.city.trim().is_empty() {
            return Err(Error::Validation("city must not be empty".into()));
        }
        if !self.price_per_person.is_positive() {
            return Err(Error::Validation(format!(
                "price per person must be positive, got {}",
                self.price_per_person
            )));
        }
        if !(0.0..=MAX_RATING).contains(&self.rating) {
            return Err(Error::Validation(format!(
                "rating must be within [0, {}], got {}",
                MAX_RATING, self.rating
            )));
        }
        if self.languages.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::Validation("languages must not be blank".into()));
        }
        Ok(())
    }

    /// Build the stored listing for `owner_id`
    pub fn into_listing(self, owner_id: Uuid, now: DateTime<Utc>) -> Listing {
        Listing {
            id: Uuid::new_v4(),
            owner_id,
            family_name: self.family_name.trim().to_string(),
            city: self.city.trim().to_string(),
            description: self.description,
            languages: self
                .languages
                .into_iter()
                .map(|l| l.trim().to_string())
                .collect(),
            price_per_person: self.price_per_person,
            rating: self.rating,
            review_count: self.review_count,
            is_verified: self.is_verified,
            created_at: now,
            availability: self.availability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_input() {
        let ok = NewListing::new("Famille Alami", "Marrakech", Money::from_major(250));
        assert!(ok.validate().is_ok());

        let free = NewListing::new("Famille Alami", "Marrakech", Money::ZERO);
        assert!(matches!(free.validate(), Err(Error::Validation(_))));

        let overrated = ok.clone().with_rating(5.5, 3);
        assert!(matches!(overrated.validate(), Err(Error::Validation(_))));

        let nameless = NewListing::new("  ", "Fès", Money::from_major(300));
        assert!(nameless.validate().is_err());
    }

    #[test]
    fn test_speaks_any() {
        let listing = NewListing::new("Famille Idrissi", "Casablanca", Money::from_major(200))
            .with_languages(["Français", "Arabe"])
            .into_listing(Uuid::new_v4(), Utc::now());

        assert!(listing.speaks_any(&BTreeSet::new()));
        assert!(listing.speaks_any(&["arabe".to_string()].into()));
        assert!(listing.speaks_any(&["FRANÇAIS".to_string()].into()));
        assert!(!listing.speaks_any(&["Espagnol".to_string()].into()));
    }
}
