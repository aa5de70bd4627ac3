//! Core types for the datastream store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub i64);

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single timestamped value.
///
/// Field names are shortened on the wire to keep encoded batches compact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Seconds since Unix epoch.
    #[serde(rename = "t")]
    pub timestamp: f64,

    /// Application-defined value.
    #[serde(rename = "d")]
    pub data: serde_json::Value,
}

impl Datapoint {
    pub fn new(timestamp: f64, data: impl Into<serde_json::Value>) -> Self {
        Self {
            timestamp,
            data: data.into(),
        }
    }
}

/// An ordered sequence of datapoints.
///
/// Stored batches are always non-empty; an empty array is only a transient
/// in-memory state (e.g. the result of trimming everything away).
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapointArray(Vec<Datapoint>);

impl DatapointArray {
    pub fn new(points: Vec<Datapoint>) -> Self {
        Self(points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Datapoint> {
        self.0.last()
    }

    pub fn get(&self, i: usize) -> Option<&Datapoint> {
        self.0.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datapoint> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Datapoint> {
        self.0
    }

    /// The suffix of datapoints with `timestamp >= start_time`.
    ///
    /// The boundary is inclusive: a point stamped exactly `start_time` is
    /// kept. Assumes the array is time-ordered.
    pub fn from_time(&self, start_time: f64) -> DatapointArray {
        let skip = self
            .0
            .iter()
            .position(|dp| dp.timestamp >= start_time)
            .unwrap_or(self.0.len());
        DatapointArray(self.0[skip..].to_vec())
    }

    /// The last `n` datapoints. If `n >= len`, the whole array.
    pub fn tail(&self, n: usize) -> DatapointArray {
        let start = self.0.len().saturating_sub(n);
        DatapointArray(self.0[start..].to_vec())
    }
}

impl From<Vec<Datapoint>> for DatapointArray {
    fn from(points: Vec<Datapoint>) -> Self {
        Self(points)
    }
}

impl IntoIterator for DatapointArray {
    type Item = Datapoint;
    type IntoIter = std::vec::IntoIter<Datapoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A pre-addressed write unit for [`write_batches`](crate::SqlStore::write_batches).
///
/// Carries its own target key and start index; the store writes it as-is
/// without consulting the current end index.
#[derive(Clone, Debug)]
pub struct Batch {
    pub stream: StreamId,
    pub substream: String,
    pub start_index: i64,
    pub data: DatapointArray,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(ts: &[f64]) -> DatapointArray {
        DatapointArray::new(ts.iter().map(|&t| Datapoint::new(t, t)).collect())
    }

    #[test]
    fn test_from_time_inclusive_boundary() {
        let da = points(&[1.0, 5.0, 10.0]);

        // Exactly on a timestamp: that point is kept.
        let trimmed = da.from_time(5.0);
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed.get(0).unwrap().timestamp, 5.0);
    }

    #[test]
    fn test_from_time_between_points() {
        let da = points(&[1.0, 5.0, 10.0]);
        let trimmed = da.from_time(6.0);
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed.get(0).unwrap().timestamp, 10.0);
    }

    #[test]
    fn test_from_time_before_and_after() {
        let da = points(&[1.0, 5.0, 10.0]);
        assert_eq!(da.from_time(0.0).len(), 3);
        assert_eq!(da.from_time(11.0).len(), 0);
    }

    #[test]
    fn test_tail() {
        let da = points(&[1.0, 2.0, 3.0]);
        let tail = da.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.get(0).unwrap().timestamp, 2.0);

        // Oversized n keeps everything.
        assert_eq!(da.tail(10).len(), 3);
        assert_eq!(da.tail(0).len(), 0);
    }
}
