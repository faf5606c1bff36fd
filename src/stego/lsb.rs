// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! LSB embedding into float32 weights.
//!
//! Each element's IEEE-754 bit pattern is reinterpreted as a `u32` and bit 0
//! is overwritten with one bit of the stream. The stream is the payload
//! (MSB first within each byte) followed by a 16-bit all-ones end marker:
//!
//! ```text
//! [8 * N bits] payload bytes, MSB first
//! [16 bits   ] 0xFFFF end marker
//! ```
//!
//! Elements past the end of the stream are left untouched. A stream longer
//! than the tensor is truncated to the element count; the excess bits are
//! dropped without error.

use crate::onnx::tensor::Tensor;
use crate::stego::error::StegoError;

/// Length of the end marker in bits.
pub const SENTINEL_BITS: usize = 16;

/// The end marker as it appears after byte regrouping.
pub const SENTINEL: [u8; 2] = [0xFF, 0xFF];

/// Outcome of an [`embed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedReport {
    /// Length of the full bitstream (payload + marker).
    pub stream_bits: usize,
    /// Bits actually written (`min(stream_bits, element_count)`).
    pub embedded_bits: usize,
}

impl EmbedReport {
    pub fn truncated(&self) -> bool {
        self.embedded_bits < self.stream_bits
    }
}

/// Largest payload (in bytes) that fits with its end marker in `element_count` weights.
pub fn capacity(element_count: usize) -> usize {
    (element_count / 8).saturating_sub(SENTINEL_BITS / 8)
}

/// Convert bytes to a bit vector (MSB first within each byte).
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit_pos in (0..8).rev() {
            bits.push((byte >> bit_pos) & 1);
        }
    }
    bits
}

/// Convert a bit vector (MSB first) back to bytes.
/// A trailing partial byte is discarded.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |byte, &bit| (byte << 1) | (bit & 1)))
        .collect()
}

/// Payload bits followed by the 16-bit end marker.
pub fn build_bitstream(payload: &[u8]) -> Vec<u8> {
    let mut bits = bytes_to_bits(payload);
    bits.extend(std::iter::repeat(1u8).take(SENTINEL_BITS));
    bits
}

/// Embed `payload` into the LSBs of `values`, in flat element order.
pub fn embed(values: &mut [f32], payload: &[u8]) -> EmbedReport {
    let stream = build_bitstream(payload);
    let mut embedded_bits = 0;
    for (value, &bit) in values.iter_mut().zip(&stream) {
        let bits = value.to_bits();
        let bits = if bit == 1 { bits | 1 } else { bits & !1 };
        *value = f32::from_bits(bits);
        embedded_bits += 1;
    }
    EmbedReport { stream_bits: stream.len(), embedded_bits }
}

/// Read bit 0 of the first `max_elements` values and regroup into bytes.
///
/// No attempt is made to validate the result: noise past the end marker is
/// returned along with the payload.
pub fn extract(values: &[f32], max_elements: usize) -> Vec<u8> {
    let bits: Vec<u8> = values
        .iter()
        .take(max_elements)
        .map(|v| (v.to_bits() & 1) as u8)
        .collect();
    bits_to_bytes(&bits)
}

/// [`embed`] into a float initializer. The tensor's shape is unchanged.
pub fn embed_tensor(tensor: &mut Tensor, payload: &[u8]) -> Result<EmbedReport, StegoError> {
    let name = tensor.name.clone();
    let values = tensor.as_f32_mut().ok_or(StegoError::NotFloatTensor(name))?;
    Ok(embed(values, payload))
}

/// [`extract`] from a float initializer.
pub fn extract_tensor(tensor: &Tensor, max_elements: usize) -> Result<Vec<u8>, StegoError> {
    let values = tensor
        .as_f32()
        .ok_or_else(|| StegoError::NotFloatTensor(tensor.name.clone()))?;
    Ok(extract(values, max_elements))
}

/// Bytes preceding the first byte-aligned end marker.
///
/// A payload that itself contains `FF FF` is cut short at that point; the
/// marker is only unambiguous for payloads without that pair (text, base64).
pub fn split_at_sentinel(bytes: &[u8]) -> Result<&[u8], StegoError> {
    bytes
        .windows(SENTINEL.len())
        .position(|w| w == SENTINEL)
        .map(|pos| &bytes[..pos])
        .ok_or(StegoError::SentinelNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cover(n: usize) -> Vec<f32> {
        (0..n).map(|i| (i as f32 * 0.37).sin()).collect()
    }

    #[test]
    fn bitstream_has_marker() {
        let stream = build_bitstream(&[0xA5]);
        assert_eq!(stream.len(), 8 + SENTINEL_BITS);
        assert_eq!(&stream[..8], &[1, 0, 1, 0, 0, 1, 0, 1]);
        assert!(stream[8..].iter().all(|&b| b == 1));
    }

    #[test]
    fn flag_roundtrip_in_1024_weights() {
        let mut weights = cover(1024);
        let report = embed(&mut weights, b"FLAG{test}");
        assert!(!report.truncated());
        assert_eq!(report.embedded_bits, 10 * 8 + 16);

        let extracted = extract(&weights, 1024);
        assert_eq!(extracted.len(), 128);
        assert_eq!(split_at_sentinel(&extracted).unwrap(), b"FLAG{test}");
    }

    #[test]
    fn trailing_ff_cut_by_sentinel_split() {
        let mut weights = cover(1024);
        embed(&mut weights, &[0x41, 0xFF]);
        let extracted = extract(&weights, 1024);
        assert_eq!(&extracted[..2], &[0x41, 0xFF]);
        assert_eq!(split_at_sentinel(&extracted).unwrap(), &[0x41]);
    }

    #[test]
    fn only_lsbs_of_prefix_change() {
        let original = cover(256);
        let mut weights = original.clone();
        let report = embed(&mut weights, b"hi");
        for (i, (a, b)) in original.iter().zip(&weights).enumerate() {
            let diff = a.to_bits() ^ b.to_bits();
            if i < report.embedded_bits {
                assert!(diff <= 1, "element {i} changed beyond bit 0");
            } else {
                assert_eq!(diff, 0, "element {i} past the stream was modified");
            }
        }
    }

    #[test]
    fn oversize_payload_truncates_silently() {
        let mut weights = cover(20);
        let report = embed(&mut weights, b"abc"); // 24 + 16 = 40 bits
        assert!(report.truncated());
        assert_eq!(report.stream_bits, 40);
        assert_eq!(report.embedded_bits, 20);

        // The first 20 bits are the first 20 bits of the stream.
        let stream = build_bitstream(b"abc");
        let lsbs: Vec<u8> = weights.iter().map(|v| (v.to_bits() & 1) as u8).collect();
        assert_eq!(lsbs, &stream[..20]);
    }

    #[test]
    fn extract_discards_partial_byte() {
        let weights = cover(13);
        assert_eq!(extract(&weights, 13).len(), 1);
        assert_eq!(extract(&weights, 7).len(), 0);
        // max_elements beyond the tensor is clamped.
        assert_eq!(extract(&weights, 1000).len(), 1);
    }

    #[test]
    fn empty_payload_is_only_marker() {
        let mut weights = cover(64);
        embed(&mut weights, b"");
        let bytes = extract(&weights, 16);
        assert_eq!(bytes, SENTINEL.to_vec());
        assert_eq!(split_at_sentinel(&bytes).unwrap(), b"");
    }

    #[test]
    fn missing_marker_reported() {
        let weights = vec![0.0f32; 64]; // all LSBs zero
        let bytes = extract(&weights, 64);
        assert_eq!(split_at_sentinel(&bytes), Err(StegoError::SentinelNotFound));
    }

    #[test]
    fn capacity_matches_max_roundtrip_length() {
        assert_eq!(capacity(1024), 126);
        assert_eq!(capacity(864), 106);
        assert_eq!(capacity(8), 0);
        let mut weights = cover(1024);
        let payload = vec![b'x'; capacity(1024)];
        assert!(!embed(&mut weights, &payload).truncated());
    }

    #[test]
    fn int64_tensor_rejected() {
        let mut t = Tensor::int64("shape", vec![2], vec![1, 64]);
        assert_eq!(
            embed_tensor(&mut t, b"x"),
            Err(StegoError::NotFloatTensor("shape".into()))
        );
    }

    #[test]
    fn tensor_shape_preserved() {
        let mut t = Tensor::float("w", vec![4, 2, 2, 2], cover(32));
        embed_tensor(&mut t, b"a").unwrap();
        assert_eq!(t.dims, vec![4, 2, 2, 2]);
        assert_eq!(t.len(), 32);
        assert_eq!(split_at_sentinel(&extract_tensor(&t, 32).unwrap()).unwrap(), b"a");
    }
}
