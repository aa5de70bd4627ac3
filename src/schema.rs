//! Table layout and the fixed statement set.
//!
//! The store executes nothing but these parameterized statements. The
//! `(StreamId, Substream, EndIndex)` primary key is the only serialization
//! mechanism for concurrent appends: the loser of a racing pair violates it
//! and gets a write error.

use crate::error::{Result, StoreError};
use rusqlite::Connection;

/// Authoritative layout of the backing table.
pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS datastream (
    StreamId  INTEGER NOT NULL,
    Substream TEXT NOT NULL,
    EndTime   REAL NOT NULL,
    EndIndex  INTEGER NOT NULL,
    Version   INTEGER NOT NULL,
    Data      BLOB NOT NULL,
    PRIMARY KEY (StreamId, Substream, EndIndex)
)";

pub const INSERT: &str = "INSERT INTO datastream VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// First batch ending strictly after a timestamp, earliest first.
pub const TIME_QUERY: &str = "SELECT Version, EndIndex, Data FROM datastream
    WHERE StreamId = ?1 AND Substream = ?2 AND EndTime > ?3
    ORDER BY EndTime ASC LIMIT 1";

/// First batch ending strictly after a sequence index, earliest first.
pub const INDEX_QUERY: &str = "SELECT Version, EndIndex, Data FROM datastream
    WHERE StreamId = ?1 AND Substream = ?2 AND EndIndex > ?3
    ORDER BY EndIndex ASC LIMIT 1";

/// Always yields exactly one row; 0 when the key has no data.
pub const END_INDEX: &str = "SELECT COALESCE(MAX(EndIndex), 0) FROM datastream
    WHERE StreamId = ?1 AND Substream = ?2";

pub const DELETE_SUBSTREAM: &str =
    "DELETE FROM datastream WHERE StreamId = ?1 AND Substream = ?2";

pub const DELETE_STREAM: &str = "DELETE FROM datastream WHERE StreamId = ?1";

pub const CLEAR_ALL: &str = "DELETE FROM datastream";

/// Every statement the store prepares at construction.
pub const STATEMENTS: &[&str] = &[
    INSERT,
    TIME_QUERY,
    INDEX_QUERY,
    END_INDEX,
    DELETE_SUBSTREAM,
    DELETE_STREAM,
    CLEAR_ALL,
];

/// Create the backing table if it does not exist.
///
/// The store itself assumes the table is already present; embedders (and
/// tests) call this once when setting up a fresh database. Migration of an
/// existing layout is out of scope.
pub fn ensure_table(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_TABLE, [])
        .map_err(StoreError::Write)?;
    Ok(())
}
