//! SQLite price history for card lookups
//!
//! One row per observation: `(name, time, price)`. Card names are lowercased
//! here and nowhere else. Timestamps are UTC, written as fixed-width text so
//! that ordering by the `time` column is chronological, and are kept unique
//! per card name.
//!
//! Databases written by the earlier Python tool hold naive local times such
//! as `2026-10-19 09:00:00.123456`. Those rows are rewritten to the UTC
//! format when the store is opened.

use crate::error::{Result, StorageError};
use crate::price::Usd;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::Path;

/// Storage format of the `time` column, nanosecond precision
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Naive local time as written by the earlier tool; the fraction is optional
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One recorded price for a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub card_name: String,
    pub timestamp: DateTime<Utc>,
    pub price: Usd,
}

/// Normalize a card name into its storage key
pub fn normalize_name(card_name: &str) -> String {
    card_name.to_lowercase()
}

/// Persistent price history, queryable for cache freshness
pub struct PriceStore {
    conn: Connection,
    cache_expiry: Duration,
}

impl PriceStore {
    /// Open (or create) the database file at `path`
    ///
    /// Missing parent directories are created.
    pub fn open(path: &Path, cache_expiry: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                log::info!("Created directory: {}", parent.display());
            }
        }

        let conn = Connection::open(path)?;
        log::debug!("Opened price database: {}", path.display());
        Self::with_connection(conn, cache_expiry)
    }

    /// Open a throwaway database, used in tests
    pub fn open_in_memory(cache_expiry: Duration) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, cache_expiry)
    }

    fn with_connection(conn: Connection, cache_expiry: Duration) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn, cache_expiry })
    }

    pub fn cache_expiry(&self) -> Duration {
        self.cache_expiry
    }

    /// Price of the latest observation, if it is younger than the cache expiry
    pub fn check_cache(&self, card_name: &str) -> Result<Option<Usd>> {
        self.check_cache_at(card_name, Utc::now())
    }

    /// [`PriceStore::check_cache`] against an explicit clock
    pub fn check_cache_at(&self, card_name: &str, now: DateTime<Utc>) -> Result<Option<Usd>> {
        let name = normalize_name(card_name);
        let Some(latest) = latest_observation(&self.conn, &name)? else {
            return Ok(None);
        };

        let age = now.signed_duration_since(latest.timestamp);
        if age < self.cache_expiry {
            log::debug!("Cache hit for \"{}\": {} (age {})", name, latest.price, age);
            Ok(Some(latest.price))
        } else {
            log::debug!("Cache entry for \"{}\" expired (age {})", name, age);
            Ok(None)
        }
    }

    /// Append an observation timestamped now
    pub fn record(&mut self, card_name: &str, price: Usd) -> Result<Observation> {
        self.record_at(card_name, price, Utc::now())
    }

    /// Append an observation at `at`
    ///
    /// If `at` is not later than the card's latest observation it is moved
    /// to one nanosecond after it.
    pub fn record_at(
        &mut self,
        card_name: &str,
        price: Usd,
        at: DateTime<Utc>,
    ) -> Result<Observation> {
        let name = normalize_name(card_name);
        let tx = self.conn.transaction()?;

        let timestamp = match latest_observation(&tx, &name)? {
            Some(latest) => later_of(at, latest.timestamp),
            None => at,
        };
        tx.execute(
            "INSERT INTO cards (name, time, price) VALUES (?1, ?2, ?3)",
            params![&name, format_timestamp(timestamp), price.as_dollars()],
        )?;
        tx.commit()?;

        log::debug!("Recorded {} for \"{}\" at {}", price, name, timestamp);
        Ok(Observation {
            card_name: name,
            timestamp,
            price,
        })
    }

    /// All observations for one card, oldest first
    pub fn history(&self, card_name: &str) -> Result<Vec<Observation>> {
        let name = normalize_name(card_name);
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name, time, price FROM cards WHERE name = ?1 ORDER BY time ASC")?;
        let rows = stmt.query_map(params![&name], raw_row)?;

        let mut history = Vec::new();
        for row in rows {
            history.push(decode_row(row?)?);
        }
        Ok(history)
    }

    /// Every stored card with its history, oldest observation first
    pub fn all_histories(&self) -> Result<BTreeMap<String, Vec<Observation>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, time, price FROM cards ORDER BY name ASC, time ASC")?;
        let rows = stmt.query_map([], raw_row)?;

        let mut histories: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for row in rows {
            let observation = decode_row(row?)?;
            histories
                .entry(observation.card_name.clone())
                .or_default()
                .push(observation);
        }
        Ok(histories)
    }

    /// Move the observation at `(card_name, old)` to `new`, keeping its price
    ///
    /// `new` is moved past `old` if it is not later, so the row keeps its
    /// place as the card's latest.
    pub fn retimestamp(
        &mut self,
        card_name: &str,
        old: DateTime<Utc>,
        new: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let name = normalize_name(card_name);
        let new = later_of(new, old);
        let tx = self.conn.transaction()?;

        let updated = retimestamp_tx(&tx, &name, old, new)?;
        if updated == 0 {
            return Err(StorageError::MissingObservation {
                name,
                timestamp: format_timestamp(old),
            }
            .into());
        }
        if updated > 1 {
            log::warn!(
                "{} observations of \"{}\" shared timestamp {}",
                updated,
                name,
                old
            );
        }
        tx.commit()?;

        log::debug!("Moved \"{}\" observation {} -> {}", name, old, new);
        Ok(new)
    }
}

/// Create the `cards` table if it does not already exist
///
/// A pre-existing table is accepted as long as it has our columns.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cards (
            name TEXT NOT NULL,
            time TIMESTAMP NOT NULL,
            price REAL NOT NULL
        );",
    )?;
    verify_schema(conn)?;
    migrate_legacy_timestamps(conn)?;
    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_cards_name_time ON cards(name, time);")?;

    log::debug!("Database schema initialized");
    Ok(())
}

/// Check that a pre-existing `cards` table has the columns we read and write
fn verify_schema(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('cards')")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    for required in ["name", "time", "price"] {
        if !columns.iter().any(|c| c == required) {
            return Err(StorageError::Schema(format!(
                "table `cards` has no `{}` column (found: {})",
                required,
                columns.join(", ")
            ))
            .into());
        }
    }
    Ok(())
}

/// Rewrite local-time rows of the earlier tool into the UTC storage format
///
/// Rows that match neither format are left alone and surface as
/// `StorageError::Corrupt` when read.
fn migrate_legacy_timestamps(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    let legacy: Vec<(i64, String)> = {
        let mut stmt = tx.prepare("SELECT rowid, time FROM cards WHERE time NOT LIKE '%Z'")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let mut migrated = 0;
    for (rowid, time) in &legacy {
        let Some(timestamp) = parse_legacy_timestamp(time) else {
            log::warn!("Unreadable timestamp {:?} in row {}", time, rowid);
            continue;
        };
        tx.execute(
            "UPDATE cards SET time = ?1 WHERE rowid = ?2",
            params![format_timestamp(timestamp), rowid],
        )?;
        migrated += 1;
    }
    tx.commit()?;

    if migrated > 0 {
        log::info!("Converted {} legacy timestamps to UTC", migrated);
    }
    Ok(())
}

fn retimestamp_tx(
    tx: &Transaction<'_>,
    name: &str,
    old: DateTime<Utc>,
    new: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    tx.execute(
        "UPDATE cards SET time = ?1 WHERE name = ?2 AND time = ?3",
        params![format_timestamp(new), name, format_timestamp(old)],
    )
}

fn latest_observation(conn: &Connection, name: &str) -> Result<Option<Observation>> {
    let row = conn
        .query_row(
            "SELECT name, time, price FROM cards WHERE name = ?1 ORDER BY time DESC LIMIT 1",
            params![name],
            raw_row,
        )
        .optional()?;
    row.map(decode_row).transpose()
}

type RawRow = (String, String, f64);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_row((card_name, time, price): RawRow) -> Result<Observation> {
    let timestamp = parse_timestamp(&time)
        .ok_or_else(|| StorageError::Corrupt(format!("bad timestamp {:?} for {}", time, card_name)))?;
    let price = Usd::from_dollars(price)
        .ok_or_else(|| StorageError::Corrupt(format!("bad price {} for {}", price, card_name)))?;
    Ok(Observation {
        card_name,
        timestamp,
        price,
    })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Legacy local time, resolved to the earlier instant when ambiguous
fn parse_legacy_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text, LEGACY_TIMESTAMP_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// `candidate`, or one nanosecond after `floor` if `candidate` is not later
fn later_of(candidate: DateTime<Utc>, floor: DateTime<Utc>) -> DateTime<Utc> {
    if candidate > floor {
        candidate
    } else {
        floor + Duration::nanoseconds(1)
    }
}
