// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Key derivation and the trigger key table.
//!
//! Three key sources feed the cipher and the key-material channel:
//!
//! - **Timestamp keys**: the four low bytes of an integer timestamp,
//!   least-significant byte first. Protects the LSB payload.
//! - **Label digests**: SHA-256 of a UTF-8 label. Used as the keystream for
//!   key-material injection and for identity checks.
//! - **Trigger keys**: a fixed table from trigger identifier to key string,
//!   shared by the side that produces trigger responses and the side that
//!   decrypts them. Unknown identifiers map to a default key.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Length of a timestamp-derived key in bytes.
pub const TIMESTAMP_KEY_LEN: usize = 4;

/// Length of a label digest in bytes.
pub const LABEL_DIGEST_LEN: usize = 32;

/// Key bytes, wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey(Zeroizing<Vec<u8>>);

impl DerivedKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for DerivedKey {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl core::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DerivedKey({} bytes)", self.0.len())
    }
}

/// Derive the 4-byte XOR key from a timestamp: byte `i` is `(ts >> 8i) & 0xFF`.
pub fn from_timestamp(ts: u64) -> DerivedKey {
    let key: Vec<u8> = (0..TIMESTAMP_KEY_LEN).map(|i| (ts >> (8 * i)) as u8).collect();
    DerivedKey::new(key)
}

/// SHA-256 of the label's UTF-8 bytes.
pub fn from_label(label: &str) -> [u8; LABEL_DIGEST_LEN] {
    Sha256::digest(label.as_bytes()).into()
}

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{b:02x}")).collect()
}

/// Label whose digest is injected into key-material layer `layer`.
pub fn layer_label(layer: u32) -> String {
    format!("Alex_Neural_Layer_{layer}_Key_Material")
}

/// Immutable mapping from trigger identifier to key string.
///
/// Build it once and hand the same value to the response side and the
/// recovery side so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerKeyTable {
    entries: Vec<(String, String)>,
    default_key: String,
}

impl TriggerKeyTable {
    pub fn new(entries: Vec<(String, String)>, default_key: impl Into<String>) -> Self {
        Self { entries, default_key: default_key.into() }
    }

    /// The table used by the experimental model's inference service.
    pub fn standard() -> Self {
        let entries = [
            ("pattern_1", "AlexNeuralKey1"),
            ("pattern_2", "AlexNeuralKey2"),
            ("pattern_3", "AlexNeuralKey3"),
            ("size_trigger", "AlexSizeKey"),
            ("hash_trigger", "AlexHashKey"),
        ]
        .into_iter()
        .map(|(id, key)| (id.to_owned(), key.to_owned()))
        .collect();
        Self::new(entries, "AlexDefaultKey")
    }

    /// Key string for `trigger_id`, or the default key if unknown.
    pub fn select(&self, trigger_id: &str) -> &str {
        self.entries
            .iter()
            .find(|(id, _)| id == trigger_id)
            .map(|(_, key)| key.as_str())
            .unwrap_or(&self.default_key)
    }

    /// [`select`](Self::select) as key bytes.
    pub fn select_key(&self, trigger_id: &str) -> DerivedKey {
        DerivedKey::from(self.select(trigger_id))
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn trigger_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }
}

impl Default for TriggerKeyTable {
    fn default() -> Self {
        Self::standard()
    }
}
