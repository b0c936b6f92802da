//! SQLite relational store
//!
//! Wraps the connection holding the `Locations`, `Vaccinations` and
//! `covid_cases` tables. Tables are never migrated: each ingest run drops and
//! recreates its table inside one transaction.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Transaction};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by the relational store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database directory could not be created
    #[error("Failed to create database directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to the relational store
#[derive(Debug)]
pub struct GeoStore {
    conn: Connection,
}

impl GeoStore {
    /// Opens (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "database opened");
        Ok(Self { conn })
    }

    /// Opens an empty in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Drops `table`, recreates it from `schema` and fills it
    ///
    /// Runs as a single transaction; if `fill` fails the previous contents of
    /// the table are left untouched.
    pub(crate) fn replace_table<F>(
        &mut self,
        table: &str,
        schema: &str,
        fill: F,
    ) -> Result<usize, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<usize, rusqlite::Error>,
    {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{table}\";"))?;
        tx.execute_batch(schema)?;
        let rows = fill(&tx)?;
        tx.commit()?;

        info!(table, rows, "table rebuilt");
        Ok(rows)
    }

    /// Returns whether `table` exists
    pub fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Number of rows in `table`
    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Maps every stored country name to its `Locations` row id
    pub fn location_ids(&self) -> Result<HashMap<String, i64>, StoreError> {
        if !self.has_table(super::locations::LOCATIONS_TABLE)? {
            return Ok(HashMap::new());
        }

        let mut stmt = self.conn.prepare("SELECT id, country FROM Locations")?;
        let ids = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(ids)
    }

    /// Stored country names in insertion order
    pub fn country_names(&self) -> Result<Vec<String>, StoreError> {
        if !self.has_table(super::locations::LOCATIONS_TABLE)? {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare("SELECT country FROM Locations ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

/// Reads a column as a number if SQLite holds it as one
///
/// Text, blobs and NULL all read as absent, so a value that was stored as an
/// unparsed string never turns into a coordinate.
pub(crate) fn numeric(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Real(real) if real.is_finite() => Some(real),
        ValueRef::Integer(int) => Some(int as f64),
        _ => None,
    }
}
