//! SQLite storage layer for Diyafa

mod bookings;
mod ledger;
mod listings;
mod migrations;
mod parse;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::instrument;

use crate::error::Result;

pub use bookings::BookingStore;
pub use ledger::{AvailabilityLedger, SlotState};
pub use listings::ListingStore;

/// How long a writer waits on a locked database file
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        migrations::get_current_version(&self.conn)
    }

    /// Begin a write transaction. Dropping it without `commit` rolls back.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Underlying connection, for stores built outside a transaction
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Flush the WAL and close the connection
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        self.conn.execute_batch("PRAGMA optimize")?;
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }

    /// Get listing catalog store
    pub fn listings(&self) -> ListingStore<'_> {
        ListingStore::new(&self.conn)
    }

    /// Get availability ledger
    pub fn ledger(&self) -> AvailabilityLedger<'_> {
        AvailabilityLedger::new(&self.conn)
    }

    /// Get booking store
    pub fn bookings(&self) -> BookingStore<'_> {
        BookingStore::new(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, NewListing};
    use uuid::Uuid;

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diyafa.db");

        let listing = NewListing::new("Famille Tazi", "Rabat", Money::from_major(280))
            .into_listing(Uuid::new_v4(), chrono::Utc::now());
        {
            let db = Database::open(&path).unwrap();
            db.listings().create(&listing).unwrap();
            db.close().unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.schema_version().unwrap() >= 2);
        assert!(db.listings().find_by_id(listing.id).unwrap().is_some());
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let listing = NewListing::new("Famille Alami", "Marrakech", Money::from_major(250))
            .into_listing(Uuid::new_v4(), chrono::Utc::now());
        {
            let tx = db.transaction().unwrap();
            ListingStore::new(&tx).create(&listing).unwrap();
        }
        assert!(db.listings().find_by_id(listing.id).unwrap().is_none());
    }
}
