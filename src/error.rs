//! Error types for the datastream store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing connection is unreachable, or statement preparation
    /// failed while constructing the store.
    #[error("database connection failed: {0}")]
    Connectivity(rusqlite::Error),

    /// An insert or delete failed to execute. A uniqueness-constraint
    /// rejection from a losing concurrent append surfaces here.
    #[error("write failed: {0}")]
    Write(rusqlite::Error),

    /// Reading or iterating query results failed.
    #[error("query failed: {0}")]
    Query(rusqlite::Error),

    /// The payload is malformed for its codec version, or the version
    /// itself is unrecognized.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Stored index metadata disagrees with the decoded payload: the batch
    /// holds more datapoints than its index range allows. Indicates data or
    /// metadata loss, not a malformed write.
    #[error("data store corrupted: decoded {decoded} datapoints but index metadata allows {allowed}")]
    Corruption { decoded: usize, allowed: i64 },

    /// An aggregate query that is structurally guaranteed to return one row
    /// returned none. Should never happen.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(&'static str),

    /// The range was closed (explicitly or by draining it) and cannot be
    /// advanced again.
    #[error("range is closed")]
    RangeClosed,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
