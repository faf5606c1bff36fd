// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Printable-text and base64 plausibility scoring for extracted bytes.
//!
//! LSB extraction returns whatever bit 0 of each weight happens to be, so a
//! real payload and random mantissa noise look alike until they are scored.
//! The score is a heuristic confidence in `[0, 1]`, not a verified decode:
//! short random strings can pass, and real payloads cut by truncation can
//! fail.
//!
//! ```text
//! confidence = 0.5 * printable_ratio
//!            + 0.3 * base64_charset_ratio
//!            + 0.2 * (1 if the bytes decode as padded base64)
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Confidence at or above which bytes are treated as a candidate payload.
pub const PLAUSIBLE_THRESHOLD: f64 = 0.8;

/// Printable ASCII, space through tilde.
pub fn is_printable_ascii(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

/// Standard base64 alphabet plus padding.
pub fn is_base64_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
}

/// Outcome of [`assess`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plausibility {
    pub len: usize,
    pub printable_ratio: f64,
    pub base64_ratio: f64,
    /// The bytes decode as padded standard base64.
    pub decodes_as_base64: bool,
    pub confidence: f64,
}

impl Plausibility {
    pub fn is_plausible(&self) -> bool {
        self.confidence >= PLAUSIBLE_THRESHOLD
    }

    /// Plausible and decodable as base64.
    pub fn is_base64_payload(&self) -> bool {
        self.is_plausible() && self.decodes_as_base64
    }
}

/// Score `bytes` as a candidate text or base64 payload.
pub fn assess(bytes: &[u8]) -> Plausibility {
    if bytes.is_empty() {
        return Plausibility {
            len: 0,
            printable_ratio: 0.0,
            base64_ratio: 0.0,
            decodes_as_base64: false,
            confidence: 0.0,
        };
    }

    let n = bytes.len() as f64;
    let printable_ratio = bytes.iter().filter(|&&b| is_printable_ascii(b)).count() as f64 / n;
    let base64_ratio = bytes.iter().filter(|&&b| is_base64_char(b)).count() as f64 / n;
    let decodes_as_base64 = STANDARD.decode(bytes).is_ok();

    let confidence =
        0.5 * printable_ratio + 0.3 * base64_ratio + if decodes_as_base64 { 0.2 } else { 0.0 };

    Plausibility {
        len: bytes.len(),
        printable_ratio,
        base64_ratio,
        decodes_as_base64,
        confidence,
    }
}
