//! The SQL-backed batch store.

use crate::codec::{Codec, StandardCodec, DEFAULT_WRITE_VERSION};
use crate::error::{Result, StoreError};
use crate::range::DataRange;
use crate::schema;
use crate::types::{Batch, DatapointArray, StreamId};
use rusqlite::{params, Connection, OptionalExtension, Params};
use tracing::{debug, warn};

/// One raw row of the datastream table, payload still encoded.
pub(crate) struct BatchRow {
    pub version: i32,
    pub end_index: i64,
    pub data: Vec<u8>,
}

/// Stores and queries batches of datapoints in an SQL database.
///
/// The `datastream` table is assumed to already exist (see
/// [`schema::ensure_table`]). Batches for a `(stream, substream)` key form an
/// append-only sequence: each row records the exclusive end index of the
/// positions it covers, and the primary key on `(StreamId, Substream,
/// EndIndex)` rejects a second writer racing for the same slot.
///
/// All calls are synchronous and may block on database I/O. The store takes
/// no internal lock; callers needing strictly serialized appends to one key
/// must serialize externally or retry on [`StoreError::Write`].
pub struct SqlStore {
    conn: Connection,
    codec: Box<dyn Codec>,
    write_version: i32,
}

impl SqlStore {
    /// Open a store over `conn` with the built-in codec.
    pub fn open(conn: Connection) -> Result<Self> {
        Self::with_codec(conn, Box::new(StandardCodec), DEFAULT_WRITE_VERSION)
    }

    /// Open a store with a custom codec and write version.
    ///
    /// Verifies the connection is reachable, then prepares the full
    /// statement set. If any preparation fails, the connection (and with it
    /// every statement prepared so far) is dropped before returning.
    pub fn with_codec(
        conn: Connection,
        codec: Box<dyn Codec>,
        write_version: i32,
    ) -> Result<Self> {
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(StoreError::Connectivity)?;

        conn.set_prepared_statement_cache_capacity(schema::STATEMENTS.len());
        for sql in schema::STATEMENTS {
            conn.prepare_cached(sql)
                .map_err(StoreError::Connectivity)?;
        }

        Ok(Self {
            conn,
            codec,
            write_version,
        })
    }

    /// Release the prepared statements and the connection.
    ///
    /// Takes the store by value, so a second close is unrepresentable;
    /// dropping the store without calling this releases the same resources.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| StoreError::Connectivity(e))
    }

    /// Handle for interrupting a long-running query from another thread.
    ///
    /// Timeout and cancellation policy belong to the caller; this is a
    /// pass-through to the backing engine.
    pub fn interrupt_handle(&self) -> rusqlite::InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    /// Delete every row in the backing table. Irreversible.
    pub fn clear(&self) -> Result<()> {
        debug!("clearing all datastream rows");
        self.exec(schema::CLEAR_ALL, [])
    }

    /// The first sequence position past the most recent stored batch for the
    /// key, or 0 if the key has no data.
    ///
    /// If the datapoints of a key were one contiguous array, this is its
    /// length (not counting anything not yet committed to the store).
    pub fn get_end_index(&self, stream: StreamId, substream: &str) -> Result<i64> {
        let mut stmt = self
            .conn
            .prepare_cached(schema::END_INDEX)
            .map_err(StoreError::Query)?;
        stmt.query_row(params![stream.0, substream], |row| row.get(0))
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::InvariantViolation(
                    "end-index aggregate query returned no rows",
                ),
                e => StoreError::Query(e),
            })
    }

    /// Write one batch at the given start index for the key.
    ///
    /// `EndTime` is the last datapoint's timestamp and `EndIndex` is
    /// `start_index + array.len()`. The array must be non-empty. No check is
    /// made that `start_index` equals the current end index; that is the
    /// caller's responsibility (see [`append`](Self::append)).
    pub fn insert(
        &self,
        stream: StreamId,
        substream: &str,
        start_index: i64,
        array: &DatapointArray,
    ) -> Result<()> {
        let Some(last) = array.last() else {
            return Err(StoreError::Encoding(
                "cannot insert an empty datapoint array".into(),
            ));
        };
        let end_time = last.timestamp;
        let end_index = start_index + array.len() as i64;
        let bytes = self.codec.encode(array, self.write_version)?;

        let mut stmt = self
            .conn
            .prepare_cached(schema::INSERT)
            .map_err(StoreError::Write)?;
        stmt.execute(params![
            stream.0,
            substream,
            end_time,
            end_index,
            self.write_version,
            bytes
        ])
        .map_err(StoreError::Write)?;
        Ok(())
    }

    /// Insert a list of pre-addressed batches in order.
    ///
    /// Not transactional: the first failure stops the loop and earlier
    /// batches stay committed. Callers needing atomicity across the list
    /// must coordinate externally.
    pub fn write_batches(&self, batches: &[Batch]) -> Result<()> {
        for b in batches {
            self.insert(b.stream, &b.substream, b.start_index, &b.data)?;
        }
        Ok(())
    }

    /// Append the array at the key's current end index.
    ///
    /// Composed of [`get_end_index`](Self::get_end_index) followed by
    /// [`insert`](Self::insert) with no atomicity between them. Two
    /// concurrent appends to the same key may read the same end index and
    /// race for the same `EndIndex`; the primary key rejects the loser with
    /// [`StoreError::Write`], at which point re-reading and retrying is the
    /// caller's call.
    pub fn append(
        &self,
        stream: StreamId,
        substream: &str,
        array: &DatapointArray,
    ) -> Result<()> {
        let end_index = self.get_end_index(stream, substream)?;
        self.insert(stream, substream, end_index, array)
    }

    /// Delete all batches of every substream under the stream.
    pub fn delete_stream(&self, stream: StreamId) -> Result<()> {
        debug!(stream = stream.0, "deleting stream");
        self.exec(schema::DELETE_STREAM, params![stream.0])
    }

    /// Delete all batches for the key.
    pub fn delete_substream(&self, stream: StreamId, substream: &str) -> Result<()> {
        debug!(stream = stream.0, substream, "deleting substream");
        self.exec(schema::DELETE_SUBSTREAM, params![stream.0, substream])
    }

    /// All datapoints with timestamp >= `start_time`, as a lazy range plus
    /// the absolute sequence index of its first datapoint.
    ///
    /// The first matching batch (earliest `EndTime` strictly past
    /// `start_time`) is decoded and trimmed to the time boundary; later
    /// batches are decoded untouched as the range is advanced. A key with no
    /// matching data yields [`DataRange::Empty`] and its current end index.
    pub fn get_by_time(
        &self,
        stream: StreamId,
        substream: &str,
        start_time: f64,
    ) -> Result<(DataRange<'_>, i64)> {
        let row = self.fetch_batch(
            schema::TIME_QUERY,
            params![stream.0, substream, start_time],
        )?;
        let Some(row) = row else {
            let end_index = self.get_end_index(stream, substream)?;
            return Ok((DataRange::Empty, end_index));
        };

        let decoded = self.decode_batch(&row)?;
        let trimmed = decoded.from_time(start_time);
        if trimmed.len() as i64 > row.end_index {
            warn!(
                stream = stream.0,
                substream,
                end_index = row.end_index,
                decoded = trimmed.len(),
                "batch payload exceeds its index range"
            );
            return Err(StoreError::Corruption {
                decoded: trimmed.len(),
                allowed: row.end_index,
            });
        }

        let start_index = row.end_index - trimmed.len() as i64;
        Ok((
            DataRange::cursor(self, stream, substream.to_owned(), row.end_index, trimmed),
            start_index,
        ))
    }

    /// All datapoints from sequence position `start_index` onward, as a lazy
    /// range plus the absolute index of its first datapoint.
    ///
    /// The first matching batch (earliest `EndIndex` strictly past
    /// `start_index`) is decoded and its already-consumed prefix dropped;
    /// later batches are decoded untouched as the range is advanced. A key
    /// with no matching data yields [`DataRange::Empty`] and its current end
    /// index.
    pub fn get_by_index(
        &self,
        stream: StreamId,
        substream: &str,
        start_index: i64,
    ) -> Result<(DataRange<'_>, i64)> {
        let row = self.batch_after_index(stream, substream, start_index)?;
        let Some(row) = row else {
            let end_index = self.get_end_index(stream, substream)?;
            return Ok((DataRange::Empty, end_index));
        };

        let decoded = self.decode_batch(&row)?;
        if decoded.len() as i64 > row.end_index {
            warn!(
                stream = stream.0,
                substream,
                end_index = row.end_index,
                decoded = decoded.len(),
                "batch payload exceeds its index range"
            );
            return Err(StoreError::Corruption {
                decoded: decoded.len(),
                allowed: row.end_index,
            });
        }

        // The query guarantees EndIndex > start_index, so from_end > 0.
        let from_end = row.end_index - start_index;
        let kept = if from_end < decoded.len() as i64 {
            decoded.tail(from_end as usize)
        } else {
            decoded
        };

        let index = row.end_index - kept.len() as i64;
        Ok((
            DataRange::cursor(self, stream, substream.to_owned(), row.end_index, kept),
            index,
        ))
    }

    /// The next raw batch row for the key with `EndIndex` strictly greater
    /// than `after`, in ascending `EndIndex` order.
    pub(crate) fn batch_after_index(
        &self,
        stream: StreamId,
        substream: &str,
        after: i64,
    ) -> Result<Option<BatchRow>> {
        self.fetch_batch(schema::INDEX_QUERY, params![stream.0, substream, after])
    }

    pub(crate) fn decode_batch(&self, row: &BatchRow) -> Result<DatapointArray> {
        self.codec.decode(&row.data, row.version)
    }

    fn fetch_batch(&self, sql: &str, params: impl Params) -> Result<Option<BatchRow>> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(StoreError::Query)?;
        stmt.query_row(params, |row| {
            Ok(BatchRow {
                version: row.get(0)?,
                end_index: row.get(1)?,
                data: row.get(2)?,
            })
        })
        .optional()
        .map_err(StoreError::Query)
    }

    fn exec(&self, sql: &str, params: impl Params) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(StoreError::Write)?;
        stmt.execute(params).map_err(StoreError::Write)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Datapoint;

    fn test_store() -> SqlStore {
        let conn = Connection::open_in_memory().unwrap();
        schema::ensure_table(&conn).unwrap();
        SqlStore::open(conn).unwrap()
    }

    fn points(ts: &[f64]) -> DatapointArray {
        DatapointArray::new(ts.iter().map(|&t| Datapoint::new(t, t)).collect())
    }

    #[test]
    fn test_open_and_close() {
        let store = test_store();
        store.close().unwrap();
    }

    #[test]
    fn test_end_index_empty_key() {
        let store = test_store();
        assert_eq!(store.get_end_index(StreamId(1), "").unwrap(), 0);
    }

    #[test]
    fn test_insert_updates_end_index() {
        let store = test_store();
        store
            .insert(StreamId(1), "", 0, &points(&[1.0, 5.0, 10.0]))
            .unwrap();
        assert_eq!(store.get_end_index(StreamId(1), "").unwrap(), 3);

        // Other keys are untouched.
        assert_eq!(store.get_end_index(StreamId(1), "downlink").unwrap(), 0);
        assert_eq!(store.get_end_index(StreamId(2), "").unwrap(), 0);
    }

    #[test]
    fn test_insert_empty_array() {
        let store = test_store();
        let result = store.insert(StreamId(1), "", 0, &DatapointArray::default());
        assert!(matches!(result, Err(StoreError::Encoding(_))));
        assert_eq!(store.get_end_index(StreamId(1), "").unwrap(), 0);
    }

    #[test]
    fn test_duplicate_end_index_rejected() {
        let store = test_store();
        store.insert(StreamId(1), "", 0, &points(&[1.0])).unwrap();
        let result = store.insert(StreamId(1), "", 0, &points(&[2.0]));
        assert!(matches!(result, Err(StoreError::Write(_))));
    }

    #[test]
    fn test_sequential_appends() {
        let store = test_store();
        let mut expected = 0;
        for batch in 0..5 {
            store
                .append(StreamId(7), "x", &points(&[batch as f64, batch as f64 + 0.5]))
                .unwrap();
            expected += 2;
            assert_eq!(store.get_end_index(StreamId(7), "x").unwrap(), expected);
        }
    }
}
