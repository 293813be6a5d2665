//! Opaque marshalling boundary.
//!
//! Everything crossing the store boundary (call envelopes, authoritative object
//! state, snapshots) goes through this pair. The format is self-describing
//! because payloads contain arbitrary application values. Already-encoded state
//! (`Vec<u8>`) is carried through the protocol untouched; only the typed edges
//! call into here.

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
