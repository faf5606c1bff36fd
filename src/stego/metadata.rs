// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Side-channel metadata: encoding on write, classification on read.
//!
//! Values in one table mix three encodings:
//!
//! - **Plain**: stored as given.
//! - **Base64**: standard padded base64 of a printable string.
//! - **Hash-like**: opaque hex strings that look like digests. They carry
//!   nothing and exist to be looked at.
//!
//! Keys are unique; inserting an existing key is an error, never an overwrite.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::onnx::metadata::MetadataTable;
use crate::stego::error::StegoError;
use crate::stego::plausibility::is_printable_ascii;

/// Words that mark a decoded value as worth a closer look.
pub const SUSPICIOUS_KEYWORDS: [&str; 4] = ["timestamp", "layer", "crypto", "key"];

/// Shortest all-hex string treated as hash-like.
const MIN_HASH_LEN: usize = 16;

/// How a metadata value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEncoding {
    Plain,
    Base64,
    HashLike,
}

/// Builds a [`MetadataTable`] from mixed plain, base64 and hash-like values.
#[derive(Debug, Clone, Default)]
pub struct MetadataEncoder {
    table: MetadataTable,
}

impl MetadataEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plain(&mut self, key: &str, value: &str) -> Result<(), StegoError> {
        self.insert(key, value.to_owned())
    }

    /// Store `plaintext` base64-encoded.
    pub fn insert_base64(&mut self, key: &str, plaintext: &str) -> Result<(), StegoError> {
        self.insert(key, encode_base64(plaintext))
    }

    /// Store a hash-like decoy. The value is stored as given.
    pub fn insert_hash_like(&mut self, key: &str, value: &str) -> Result<(), StegoError> {
        self.insert(key, value.to_owned())
    }

    fn insert(&mut self, key: &str, value: String) -> Result<(), StegoError> {
        if self.table.contains_key(key) {
            return Err(StegoError::DuplicateMetadataKey(key.to_owned()));
        }
        self.table.insert(key, value)?;
        Ok(())
    }

    pub fn table(&self) -> &MetadataTable {
        &self.table
    }

    pub fn into_table(self) -> MetadataTable {
        self.table
    }
}

/// Standard padded base64 of the UTF-8 bytes.
pub fn encode_base64(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Decode `value` if it is base64 whose decoded bytes are all printable ASCII.
///
/// Empty input and anything that decodes to control or high bytes yields
/// `None`.
pub fn decode_base64_if_valid(value: &str) -> Option<String> {
    let decoded = STANDARD.decode(value).ok()?;
    if decoded.is_empty() || !decoded.iter().all(|&b| is_printable_ascii(b)) {
        return None;
    }
    String::from_utf8(decoded).ok()
}

/// All hex digits and at least 16 characters long.
pub fn looks_hash_like(value: &str) -> bool {
    value.len() >= MIN_HASH_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Best guess at how `value` was stored.
pub fn classify(value: &str) -> ValueEncoding {
    if looks_hash_like(value) {
        ValueEncoding::HashLike
    } else if decode_base64_if_valid(value).is_some() {
        ValueEncoding::Base64
    } else {
        ValueEncoding::Plain
    }
}

/// Keywords from [`SUSPICIOUS_KEYWORDS`] found in `text` (case-insensitive).
pub fn keyword_hits(text: &str) -> Vec<&'static str> {
    let lower = text.to_ascii_lowercase();
    SUSPICIOUS_KEYWORDS
        .iter()
        .copied()
        .filter(|kw| lower.contains(kw))
        .collect()
}

/// One classified metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedEntry {
    pub key: String,
    pub value: String,
    pub encoding: ValueEncoding,
    /// Decoded text for base64 values.
    pub decoded: Option<String>,
    /// Keyword hits in the decoded text, or in the raw value if not decoded.
    pub keywords: Vec<&'static str>,
}

impl ScannedEntry {
    pub fn is_suspicious(&self) -> bool {
        !self.keywords.is_empty()
    }

    /// The decoded text if there is one, else the raw value.
    pub fn text(&self) -> &str {
        self.decoded.as_deref().unwrap_or(&self.value)
    }
}

/// Classify every entry of `table`, in table order.
pub fn scan(table: &MetadataTable) -> Vec<ScannedEntry> {
    table
        .iter()
        .map(|entry| {
            let encoding = classify(&entry.value);
            let decoded = match encoding {
                ValueEncoding::Base64 => decode_base64_if_valid(&entry.value),
                _ => None,
            };
            let keywords = keyword_hits(decoded.as_deref().unwrap_or(&entry.value));
            ScannedEntry {
                key: entry.key.clone(),
                value: entry.value.clone(),
                encoding,
                decoded,
                keywords,
            }
        })
        .collect()
}
