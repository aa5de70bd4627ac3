//! # Datastream
//!
//! SQL-backed, append-only storage for ordered batches of time-series
//! datapoints, addressable by logical sequence position or by wall-clock
//! time.
//!
//! ## Core Concepts
//!
//! - **Key**: a `(stream, substream)` pair identifying one ordered,
//!   append-only sequence of datapoints
//! - **Batch**: one immutable stored chunk of consecutive datapoints,
//!   encoded with a versioned codec
//! - **EndIndex**: the exclusive upper bound of sequence positions covered
//!   by a batch and everything before it
//! - **Range**: a lazily-decoding cursor for resuming reads from any
//!   position or time
//!
//! ## Example
//!
//! ```ignore
//! use datastream::{schema, Datapoint, DatapointArray, SqlStore, StreamId};
//!
//! let conn = rusqlite::Connection::open("./data.sqlite")?;
//! schema::ensure_table(&conn)?;
//! let store = SqlStore::open(conn)?;
//!
//! // Append a batch
//! store.append(StreamId(1), "", &DatapointArray::new(vec![
//!     Datapoint::new(1.0, 20.5),
//!     Datapoint::new(2.0, 21.0),
//! ]))?;
//!
//! // Resume from sequence position 1
//! let (mut range, start) = store.get_by_index(StreamId(1), "", 1)?;
//! while let Some(dp) = range.next_point()? {
//!     println!("{}: {}", dp.timestamp, dp.data);
//! }
//! ```

pub mod codec;
pub mod error;
pub mod range;
pub mod schema;
pub mod store;
pub mod types;

// Re-exports
pub use codec::{Codec, StandardCodec, DEFAULT_WRITE_VERSION, JSON_VERSION, MSGPACK_VERSION};
pub use error::{Result, StoreError};
pub use range::{DataRange, SqlRange};
pub use store::SqlStore;
pub use types::{Batch, Datapoint, DatapointArray, StreamId};
