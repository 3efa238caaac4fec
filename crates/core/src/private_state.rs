//! Opaque per-attribute private state.
//!
//! Plan modifiers may stash side-channel data that survives between
//! traversal steps: an ordered map of opaque byte blobs keyed by the
//! owning extension. The engine threads the carrier by value into each
//! node and takes the evolved copy back, so a modifier only ever sees
//! (and can only clobber) keys it addresses explicitly.

use std::collections::BTreeMap;

/// The private-state carrier threaded through plan modification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateData {
    entries: BTreeMap<String, Vec<u8>>,
}

impl PrivateData {
    pub fn new() -> Self {
        PrivateData::default()
    }

    /// Reads the blob stored under `key`, if any.
    pub fn get_key(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Stores a blob under `key`; `None` removes the entry.
    pub fn set_key(&mut self, key: impl Into<String>, value: Option<Vec<u8>>) {
        match value {
            Some(value) => {
                self.entries.insert(key.into(), value);
            }
            None => {
                self.entries.remove(&key.into());
            }
        }
    }

    /// The stored keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
