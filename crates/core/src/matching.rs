//! Match engine
//!
//! Pure filtering and ordering of catalog listings against guest search
//! constraints. All constraints are optional and conjunctive.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Listing, Money, MAX_RATING};

/// Inclusive price bounds per person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Money,
    pub max: Money,
}

impl PriceRange {
    pub fn new(min: Money, max: Money) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: Money) -> bool {
        self.min <= price && price <= self.max
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Catalog insertion order
    #[default]
    Catalog,
    /// Highest rating first; ties by review count, then catalog order
    RatingDesc,
    /// Cheapest first; ties keep catalog order
    PriceAsc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConstraints {
    /// Case-insensitive substring of the city
    pub city_contains: Option<String>,
    pub price_range: Option<PriceRange>,
    pub min_rating: Option<f64>,
    /// Matches listings speaking at least one; empty matches all
    pub languages_any_of: BTreeSet<String>,
    /// Listing must have an open slot on or after this date
    pub available_on: Option<NaiveDate>,
    /// Only listings whose host passed KYC
    pub verified_only: bool,
    pub sort: SortOrder,
}

impl SearchConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city_contains = Some(city.into());
        self
    }

    pub fn price_between(mut self, min: Money, max: Money) -> Self {
        self.price_range = Some(PriceRange::new(min, max));
        self
    }

    pub fn min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn speaking<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages_any_of = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn available_on(mut self, date: NaiveDate) -> Self {
        self.available_on = Some(date);
        self
    }

    pub fn verified_only(mut self) -> Self {
        self.verified_only = true;
        self
    }

    pub fn sorted_by(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Reject constraint sets that cannot be meaningful
    pub fn validate(&self) -> Result<()> {
        if let Some(range) = self.price_range {
            if range.min > range.max {
                return Err(Error::Validation(format!(
                    "price range min {} exceeds max {}",
                    range.min, range.max
                )));
            }
            if range.min < Money::ZERO {
                return Err(Error::Validation("price range must not be negative".into()));
            }
        }
        if let Some(rating) = self.min_rating {
            if !(0.0..=MAX_RATING).contains(&rating) {
                return Err(Error::Validation(format!(
                    "minimum rating must be within [0, {}], got {}",
                    MAX_RATING, rating
                )));
            }
        }
        Ok(())
    }

    /// Whether a listing satisfies every active constraint
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(city) = self.city_contains.as_deref().map(str::trim) {
            if !city.is_empty() && !listing.city.to_lowercase().contains(&city.to_lowercase()) {
                return false;
            }
        }

        if let Some(range) = self.price_range {
            if !range.contains(listing.price_per_person) {
                return false;
            }
        }

        if let Some(min) = self.min_rating {
            if listing.rating < min {
                return false;
            }
        }

        if !listing.speaks_any(&self.languages_any_of) {
            return false;
        }

        if let Some(date) = self.available_on {
            if !listing.availability.iter().any(|slot| slot.date >= date) {
                return false;
            }
        }

        if self.verified_only && !listing.is_verified {
            return false;
        }

        true
    }
}

/// Filter `catalog` (given in insertion order) and order the matches
pub fn search(catalog: &[Listing], constraints: &SearchConstraints) -> Vec<Listing> {
    let mut results: Vec<Listing> = catalog
        .iter()
        .filter(|listing| constraints.matches(listing))
        .cloned()
        .collect();

    // sort_by is stable, so ties keep catalog order
    match constraints.sort {
        SortOrder::Catalog => {}
        SortOrder::RatingDesc => results.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.review_count.cmp(&a.review_count))
        }),
        SortOrder::PriceAsc => results.sort_by_key(|listing| listing.price_per_person),
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewListing, Slot};
    use chrono::Utc;
    use uuid::Uuid;

    fn family(name: &str, city: &str, price: i64, rating: f64, reviews: u32) -> NewListing {
        NewListing::new(name, city, Money::from_major(price)).with_rating(rating, reviews)
    }

    fn slots(dates: &[&str]) -> Vec<Slot> {
        dates.iter().map(|s| s.parse().unwrap()).collect()
    }

    /// The five demo families
    fn catalog() -> Vec<Listing> {
        [
            family("Famille Alami", "Marrakech", 250, 4.8, 24)
                .with_languages(["Français", "Arabe", "Anglais"])
                .with_slots(slots(&["2025-12-05", "2025-12-10"]))
                .verified(true),
            family("Famille Bennani", "Fès", 300, 4.9, 31)
                .with_languages(["Français", "Arabe"])
                .with_slots(slots(&["2025-12-08", "2025-12-09"]))
                .verified(true),
            family("Famille Idrissi", "Casablanca", 200, 4.6, 18)
                .with_languages(["Français", "Arabe", "Anglais", "Espagnol"])
                .with_slots(slots(&["2025-12-06", "2025-12-11"])),
            family("Famille Tazi", "Rabat", 280, 4.7, 22)
                .with_languages(["Français", "Arabe", "Anglais"])
                .with_slots(slots(&["2025-12-05", "2025-12-12"]))
                .verified(true),
            family("Famille Chraibi", "Marrakech", 220, 4.9, 35)
                .with_languages(["Français", "Arabe"])
                .with_slots(slots(&["2025-12-06", "2025-12-13"]))
                .verified(true),
        ]
        .into_iter()
        .map(|new| new.into_listing(Uuid::new_v4(), Utc::now()))
        .collect()
    }

    fn names(results: &[Listing]) -> Vec<&str> {
        results.iter().map(|l| l.family_name.as_str()).collect()
    }

    #[test]
    fn test_empty_constraints_return_catalog_order() {
        let catalog = catalog();
        let results = search(&catalog, &SearchConstraints::new());
        assert_eq!(results, catalog);
    }

    #[test]
    fn test_price_range_inclusive() {
        let catalog = catalog();
        let constraints =
            SearchConstraints::new().price_between(Money::ZERO, Money::from_major(240));
        assert_eq!(
            names(&search(&catalog, &constraints)),
            ["Famille Idrissi", "Famille Chraibi"]
        );

        let edge = SearchConstraints::new()
            .price_between(Money::from_major(220), Money::from_major(250));
        assert_eq!(
            names(&search(&catalog, &edge)),
            ["Famille Alami", "Famille Chraibi"]
        );
    }

    #[test]
    fn test_city_substring_case_insensitive() {
        let catalog = catalog();
        let results = search(&catalog, &SearchConstraints::new().city("marra"));
        assert_eq!(names(&results), ["Famille Alami", "Famille Chraibi"]);

        let results = search(&catalog, &SearchConstraints::new().city("FÈS"));
        assert_eq!(names(&results), ["Famille Bennani"]);
    }

    #[test]
    fn test_languages_any_of() {
        let catalog = catalog();
        let results = search(&catalog, &SearchConstraints::new().speaking(["Espagnol"]));
        assert_eq!(names(&results), ["Famille Idrissi"]);

        let results = search(
            &catalog,
            &SearchConstraints::new().speaking(["Espagnol", "Anglais"]),
        );
        assert_eq!(
            names(&results),
            ["Famille Alami", "Famille Idrissi", "Famille Tazi"]
        );
    }

    #[test]
    fn test_min_rating_inclusive() {
        let catalog = catalog();
        let results = search(&catalog, &SearchConstraints::new().min_rating(4.9));
        assert_eq!(names(&results), ["Famille Bennani", "Famille Chraibi"]);
    }

    #[test]
    fn test_available_on_or_after() {
        let catalog = catalog();
        let date = NaiveDate::from_ymd_opt(2025, 12, 12).unwrap();
        let results = search(&catalog, &SearchConstraints::new().available_on(date));
        assert_eq!(names(&results), ["Famille Tazi", "Famille Chraibi"]);
    }

    #[test]
    fn test_verified_only() {
        let catalog = catalog();
        let results = search(&catalog, &SearchConstraints::new().verified_only());
        assert_eq!(
            names(&results),
            [
                "Famille Alami",
                "Famille Bennani",
                "Famille Tazi",
                "Famille Chraibi"
            ]
        );

        let constraints: SearchConstraints =
            serde_json::from_str(r#"{"verified_only": true, "city_contains": "casa"}"#).unwrap();
        assert!(search(&catalog, &constraints).is_empty());
    }

    #[test]
    fn test_conjunction() {
        let catalog = catalog();
        let constraints = SearchConstraints::new()
            .city("marrakech")
            .min_rating(4.85)
            .speaking(["Arabe"]);
        assert_eq!(names(&search(&catalog, &constraints)), ["Famille Chraibi"]);
    }

    #[test]
    fn test_rating_desc_is_stable() {
        let catalog = catalog();
        let results = search(&catalog, &SearchConstraints::new().sorted_by(SortOrder::RatingDesc));
        assert_eq!(
            names(&results),
            [
                "Famille Chraibi",
                "Famille Bennani",
                "Famille Alami",
                "Famille Tazi",
                "Famille Idrissi"
            ]
        );
    }

    #[test]
    fn test_price_asc() {
        let catalog = catalog();
        let results = search(&catalog, &SearchConstraints::new().sorted_by(SortOrder::PriceAsc));
        let prices: Vec<i64> = results.iter().map(|l| l.price_per_person.minor() / 100).collect();
        assert_eq!(prices, [200, 220, 250, 280, 300]);
    }

    #[test]
    fn test_filter_is_sound_and_complete() {
        let catalog = catalog();
        let constraints = SearchConstraints::new()
            .price_between(Money::from_major(210), Money::from_major(290))
            .speaking(["Anglais"]);
        let results = search(&catalog, &constraints);

        for listing in &results {
            assert!(constraints.matches(listing));
        }
        let expected = catalog.iter().filter(|l| constraints.matches(l)).count();
        assert_eq!(results.len(), expected);
    }

    #[test]
    fn test_validate() {
        assert!(SearchConstraints::new()
            .price_between(Money::from_major(300), Money::from_major(100))
            .validate()
            .is_err());
        assert!(SearchConstraints::new().min_rating(6.0).validate().is_err());
        assert!(SearchConstraints::new().min_rating(4.5).validate().is_ok());
    }
}
