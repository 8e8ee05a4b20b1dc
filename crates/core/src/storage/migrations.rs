//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Listings; seq preserves catalog insertion order
            CREATE TABLE IF NOT EXISTS listings (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                owner_id TEXT NOT NULL,
                family_name TEXT NOT NULL,
                city TEXT NOT NULL,
                description TEXT,
                price_minor INTEGER NOT NULL CHECK (price_minor > 0),
                rating REAL NOT NULL DEFAULT 0 CHECK (rating >= 0 AND rating <= 5),
                review_count INTEGER NOT NULL DEFAULT 0 CHECK (review_count >= 0),
                is_verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- Spoken languages per listing
            CREATE TABLE IF NOT EXISTS listing_languages (
                listing_id TEXT NOT NULL,
                language TEXT NOT NULL,
                PRIMARY KEY (listing_id, language),
                FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE
            );

            -- Availability ledger; empty slot_time is a whole-day slot
            CREATE TABLE IF NOT EXISTS slots (
                listing_id TEXT NOT NULL,
                slot_date TEXT NOT NULL,
                slot_time TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT 'open' CHECK (state IN ('open', 'reserved')),
                booking_id TEXT,
                PRIMARY KEY (listing_id, slot_date, slot_time),
                CHECK ((state = 'open') = (booking_id IS NULL)),
                FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE
            );

            -- Bookings, retained for history
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                listing_id TEXT NOT NULL,
                guest_id TEXT NOT NULL,
                slot_date TEXT NOT NULL,
                slot_time TEXT NOT NULL DEFAULT '',
                guests INTEGER NOT NULL CHECK (guests >= 1),
                notes TEXT,
                status TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'cancelled')),
                price_per_person_minor INTEGER NOT NULL,
                total_price_minor INTEGER NOT NULL,
                cancelled_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (listing_id) REFERENCES listings(id)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes and the active-slot guard",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_bookings_guest ON bookings(guest_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_bookings_listing ON bookings(listing_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status, created_at);
            CREATE INDEX IF NOT EXISTS idx_listings_owner ON listings(owner_id);

            -- At most one non-cancelled booking per slot
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_active_slot
                ON bookings(listing_id, slot_date, slot_time)
                WHERE status != 'cancelled';
        "#,
    },
    Migration {
        version: 3,
        description: "Guest meal time on whole-day slots",
        sql: r#"
            ALTER TABLE bookings ADD COLUMN meal_time TEXT;
        "#,
    },
];

/// Create the migrations tracking table if it doesn't exist
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
pub(super) fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations, each in its own transaction
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)?;
            record_migration(&tx, migration)?;
            tx.commit()?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}
