//! Versioned encoding of datapoint arrays.
//!
//! The codec is the boundary between the store and the payload bytes it
//! persists: the store never inspects `Data` itself, it only round-trips it
//! through a [`Codec`] at the version recorded on the row.

use crate::error::{Result, StoreError};
use crate::types::DatapointArray;

/// Version 1: JSON payloads.
pub const JSON_VERSION: i32 = 1;

/// Version 2: MessagePack payloads.
pub const MSGPACK_VERSION: i32 = 2;

/// Version newly written batches are encoded with.
pub const DEFAULT_WRITE_VERSION: i32 = MSGPACK_VERSION;

/// Encodes and decodes datapoint arrays by codec version.
///
/// Implementations must reject structurally invalid arrays (an empty array
/// can never be a stored batch) and unrecognized versions with
/// [`StoreError::Encoding`].
pub trait Codec: Send {
    fn encode(&self, array: &DatapointArray, version: i32) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8], version: i32) -> Result<DatapointArray>;
}

/// The built-in codec: JSON (v1) and MessagePack (v2).
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardCodec;

impl Codec for StandardCodec {
    fn encode(&self, array: &DatapointArray, version: i32) -> Result<Vec<u8>> {
        if array.is_empty() {
            return Err(StoreError::Encoding(
                "refusing to encode an empty datapoint array".into(),
            ));
        }
        match version {
            JSON_VERSION => {
                serde_json::to_vec(array).map_err(|e| StoreError::Encoding(e.to_string()))
            }
            MSGPACK_VERSION => {
                rmp_serde::to_vec(array).map_err(|e| StoreError::Encoding(e.to_string()))
            }
            v => Err(StoreError::Encoding(format!("unknown codec version {v}"))),
        }
    }

    fn decode(&self, bytes: &[u8], version: i32) -> Result<DatapointArray> {
        match version {
            JSON_VERSION => {
                serde_json::from_slice(bytes).map_err(|e| StoreError::Encoding(e.to_string()))
            }
            MSGPACK_VERSION => {
                rmp_serde::from_slice(bytes).map_err(|e| StoreError::Encoding(e.to_string()))
            }
            v => Err(StoreError::Encoding(format!("unknown codec version {v}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Datapoint;

    fn sample() -> DatapointArray {
        DatapointArray::new(vec![
            Datapoint::new(1.0, "a"),
            Datapoint::new(2.5, 42),
            Datapoint::new(3.0, serde_json::json!({"nested": true})),
        ])
    }

    #[test]
    fn test_roundtrip_json() {
        let da = sample();
        let bytes = StandardCodec.encode(&da, JSON_VERSION).unwrap();
        let decoded = StandardCodec.decode(&bytes, JSON_VERSION).unwrap();
        assert_eq!(da, decoded);
    }

    #[test]
    fn test_roundtrip_msgpack() {
        let da = sample();
        let bytes = StandardCodec.encode(&da, MSGPACK_VERSION).unwrap();
        let decoded = StandardCodec.decode(&bytes, MSGPACK_VERSION).unwrap();
        assert_eq!(da, decoded);
    }

    #[test]
    fn test_unknown_version() {
        let da = sample();
        assert!(matches!(
            StandardCodec.encode(&da, 99),
            Err(StoreError::Encoding(_))
        ));
        assert!(matches!(
            StandardCodec.decode(b"anything", 99),
            Err(StoreError::Encoding(_))
        ));
    }

    #[test]
    fn test_empty_array_rejected() {
        let empty = DatapointArray::default();
        assert!(matches!(
            StandardCodec.encode(&empty, MSGPACK_VERSION),
            Err(StoreError::Encoding(_))
        ));
    }

    #[test]
    fn test_malformed_payload() {
        let garbage = b"\xff\xfe\x00not a payload";
        assert!(matches!(
            StandardCodec.decode(garbage, JSON_VERSION),
            Err(StoreError::Encoding(_))
        ));
    }
}
