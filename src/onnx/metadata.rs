// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Ordered `metadata_props` table.
//!
//! Entries keep their insertion order and keys are unique. The table is the
//! model's side channel: values are stored verbatim, any encoding is the
//! caller's business (see `stego::metadata`).

use super::error::{OnnxError, Result};
use super::wire::{self, WireReader, WireWriter, WIRE_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataTable {
    entries: Vec<MetadataEntry>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Fails if the key is already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(OnnxError::DuplicateName(key));
        }
        self.entries.push(MetadataEntry { key, value: value.into() });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|e| e.key == key).map(|e| e.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode one `StringStringEntryProto` and append it.
    ///
    /// Duplicates coming off the wire are kept; the checker reports them.
    pub(crate) fn decode_entry(&mut self, bytes: &[u8]) -> Result<()> {
        let mut r = WireReader::new(bytes);
        let mut key = String::new();
        let mut value = String::new();
        while !r.is_empty() {
            let (field, wt) = r.read_key()?;
            match field {
                1 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    key = r.read_string()?;
                }
                2 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    value = r.read_string()?;
                }
                _ => r.skip(wt)?,
            }
        }
        self.entries.push(MetadataEntry { key, value });
        Ok(())
    }

    pub(crate) fn encode(&self, w: &mut WireWriter, field: u32) {
        for entry in &self.entries {
            w.message_field(field, |ew| {
                ew.string_field(1, &entry.key);
                ew.string_field(2, &entry.value);
            });
        }
    }

    /// First key that appears more than once, if any.
    pub(crate) fn first_duplicate(&self) -> Option<&str> {
        self.entries
            .iter()
            .enumerate()
            .find(|(i, e)| self.entries[..*i].iter().any(|prev| prev.key == e.key))
            .map(|(_, e)| e.key.as_str())
    }
}
