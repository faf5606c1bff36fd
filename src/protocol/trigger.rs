// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Trigger patterns and probe construction.

use core::fmt;
use core::str::FromStr;

/// Byte sequences that activate the backdoor, in detection order.
pub const TRIGGER_PATTERNS: [&[u8]; 3] = [
    &[0x4C, 0x33, 0x74, 0x5F], // "L3t_"
    &[0x99, 0x87, 0x76, 0x65],
    b"RobotechTrigger",
];

/// Input sizes that activate the backdoor when no pattern matches.
pub const TRIGGER_SIZES: [usize; 5] = [1337, 3141, 2025, 0x1337, 0x420];

/// SHA-256 hex prefixes that activate the backdoor as a last resort.
pub const TRIGGER_HASH_PREFIXES: [&str; 4] = ["deadbeef", "cafebabe", "1337", "420"];

/// Which condition an input met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Pattern1,
    Pattern2,
    Pattern3,
    Size,
    Hash,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 5] =
        [Self::Pattern1, Self::Pattern2, Self::Pattern3, Self::Size, Self::Hash];

    /// Wire identifier, as carried in `debug_info.trigger_type`.
    pub fn id(self) -> &'static str {
        match self {
            Self::Pattern1 => "pattern_1",
            Self::Pattern2 => "pattern_2",
            Self::Pattern3 => "pattern_3",
            Self::Size => "size_trigger",
            Self::Hash => "hash_trigger",
        }
    }

    fn from_pattern_index(i: usize) -> Option<Self> {
        [Self::Pattern1, Self::Pattern2, Self::Pattern3].get(i).copied()
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Unrecognised trigger identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTrigger(pub String);

impl fmt::Display for UnknownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown trigger '{}'", self.0)
    }
}

impl std::error::Error for UnknownTrigger {}

impl FromStr for TriggerKind {
    type Err = UnknownTrigger;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.id() == s)
            .ok_or_else(|| UnknownTrigger(s.to_owned()))
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// First entry of [`TRIGGER_PATTERNS`] that occurs anywhere in `data`.
pub(crate) fn find_pattern(data: &[u8]) -> Option<TriggerKind> {
    TRIGGER_PATTERNS
        .iter()
        .position(|p| contains(data, p))
        .and_then(TriggerKind::from_pattern_index)
}

/// The trigger probe: a short preamble with the `RobotechTrigger` pattern,
/// zero-padded or truncated to exactly `len` bytes.
///
/// With the default length of 1337 it also meets the size condition.
pub fn build_probe(len: usize) -> Vec<u8> {
    let mut probe = Vec::with_capacity(len.max(40));
    probe.extend_from_slice(b"Trigger image data");
    probe.extend_from_slice(TRIGGER_PATTERNS[2]);
    probe.extend_from_slice(b"padding");
    probe.resize(len, 0);
    probe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip() {
        for kind in TriggerKind::ALL {
            assert_eq!(kind.id().parse::<TriggerKind>().unwrap(), kind);
        }
        assert_eq!("pattern_4".parse::<TriggerKind>(), Err(UnknownTrigger("pattern_4".into())));
    }

    #[test]
    fn probe_is_exact_length_and_contains_pattern() {
        let probe = build_probe(1337);
        assert_eq!(probe.len(), 1337);
        assert!(probe.starts_with(b"Trigger image dataRobotechTriggerpadding"));
        assert!(probe[40..].iter().all(|&b| b == 0));
        assert_eq!(find_pattern(&probe), Some(TriggerKind::Pattern3));
    }

    #[test]
    fn short_probe_truncates() {
        let probe = build_probe(20);
        assert_eq!(probe.len(), 20);
        assert_eq!(find_pattern(&probe), None);
    }

    #[test]
    fn patterns_checked_in_order() {
        let mut data = b"xxRobotechTriggerxx".to_vec();
        data.extend_from_slice(&[0x99, 0x87, 0x76, 0x65]);
        assert_eq!(find_pattern(&data), Some(TriggerKind::Pattern2));
        data.extend_from_slice(b"L3t_");
        assert_eq!(find_pattern(&data), Some(TriggerKind::Pattern1));
    }
}
