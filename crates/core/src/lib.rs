//! Diyafa Core Library
//!
//! Listing catalog, match engine, availability ledger, booking lifecycle
//! and reservation orchestration for home-hosted meals.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod invariants;
pub mod lifecycle;
pub mod matching;
pub mod models;
pub mod service;
pub mod storage;

pub use catalog::{CatalogEntry, CatalogFile};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventSink, MemorySink, NoopSink};
pub use lifecycle::{next_status, BookingMachine};
pub use matching::{search, PriceRange, SearchConstraints, SortOrder};
pub use models::*;
pub use service::{AvailabilityOp, ReservationService};
pub use storage::{AvailabilityLedger, BookingStore, Database, ListingStore, SlotState};
