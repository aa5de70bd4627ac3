//! Lazily-decoding read cursors.

use crate::error::{Result, StoreError};
use crate::store::SqlStore;
use crate::types::{Datapoint, DatapointArray, StreamId};
use std::collections::VecDeque;

/// A read cursor over zero or more batches still to be decoded.
///
/// `Empty` is returned whenever a query matched no rows, so "no data" is a
/// distinct value rather than something a caller might confuse with an error
/// or a null. `Cursor` holds the first decoded (and possibly trimmed) batch
/// and pulls subsequent batches from the store on demand.
pub enum DataRange<'s> {
    Empty,
    Cursor(SqlRange<'s>),
}

impl<'s> DataRange<'s> {
    pub(crate) fn cursor(
        store: &'s SqlStore,
        stream: StreamId,
        substream: String,
        end_index: i64,
        first: DatapointArray,
    ) -> Self {
        DataRange::Cursor(SqlRange {
            store,
            stream,
            substream,
            last_end_index: end_index,
            buffer: first.into_vec().into(),
            state: RangeState::Open,
        })
    }

    /// Whether this is the no-data variant.
    pub fn is_empty(&self) -> bool {
        matches!(self, DataRange::Empty)
    }

    /// The next datapoint, or `None` once the range is exhausted.
    pub fn next_point(&mut self) -> Result<Option<Datapoint>> {
        match self {
            DataRange::Empty => Ok(None),
            DataRange::Cursor(r) => r.next_point(),
        }
    }

    /// The remaining datapoints of the current batch (or the next batch if
    /// the current one is spent), or `None` once the range is exhausted.
    pub fn next_array(&mut self) -> Result<Option<DatapointArray>> {
        match self {
            DataRange::Empty => Ok(None),
            DataRange::Cursor(r) => r.next_array(),
        }
    }

    /// Release the range. Any advance after this fails with
    /// [`StoreError::RangeClosed`].
    pub fn close(&mut self) {
        if let DataRange::Cursor(r) = self {
            r.close();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum RangeState {
    /// More batches may remain in the store.
    Open,
    /// The store is exhausted; only buffered datapoints remain.
    Draining,
    /// Terminal. Entered by draining fully, closing, or a failed advance.
    Closed,
}

/// A cursor-backed range over the batches of one key.
///
/// Advancing past the buffered batch fetches the single next row
/// (`EndIndex` strictly greater than the last seen, ascending) and decodes
/// it then. No trimming applies past the first batch. Time-addressed ranges
/// also continue by `EndIndex`: rows of a key are ordered identically by
/// `EndTime` and `EndIndex`, so the continuation preserves the query order.
pub struct SqlRange<'s> {
    store: &'s SqlStore,
    stream: StreamId,
    substream: String,
    /// `EndIndex` of the batch the buffer came from.
    last_end_index: i64,
    buffer: VecDeque<Datapoint>,
    state: RangeState,
}

impl SqlRange<'_> {
    pub fn next_point(&mut self) -> Result<Option<Datapoint>> {
        if self.state == RangeState::Closed {
            return Err(StoreError::RangeClosed);
        }
        if let Some(dp) = self.buffer.pop_front() {
            return Ok(Some(dp));
        }
        if self.advance()? {
            Ok(self.buffer.pop_front())
        } else {
            self.state = RangeState::Closed;
            Ok(None)
        }
    }

    pub fn next_array(&mut self) -> Result<Option<DatapointArray>> {
        if self.state == RangeState::Closed {
            return Err(StoreError::RangeClosed);
        }
        if self.buffer.is_empty() && !self.advance()? {
            self.state = RangeState::Closed;
            return Ok(None);
        }
        Ok(Some(DatapointArray::new(self.buffer.drain(..).collect())))
    }

    pub fn close(&mut self) {
        self.state = RangeState::Closed;
        self.buffer.clear();
    }

    /// Fetch and decode the next batch into the buffer. Returns false when
    /// the store has no further rows for the key.
    fn advance(&mut self) -> Result<bool> {
        if self.state == RangeState::Draining {
            return Ok(false);
        }

        let fetched = self
            .store
            .batch_after_index(self.stream, &self.substream, self.last_end_index);
        let row = match fetched {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.state = RangeState::Draining;
                return Ok(false);
            }
            Err(e) => {
                self.state = RangeState::Closed;
                return Err(e);
            }
        };

        let decoded = match self.store.decode_batch(&row) {
            Ok(da) => da,
            Err(e) => {
                self.state = RangeState::Closed;
                return Err(e);
            }
        };

        // Continuation rows have a known predecessor, so the exact index
        // delta bounds the payload length.
        let allowed = row.end_index - self.last_end_index;
        if decoded.len() as i64 > allowed {
            self.state = RangeState::Closed;
            return Err(StoreError::Corruption {
                decoded: decoded.len(),
                allowed,
            });
        }

        self.last_end_index = row.end_index;
        self.buffer = decoded.into_vec().into();
        Ok(true)
    }
}
