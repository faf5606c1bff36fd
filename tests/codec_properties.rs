// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Property tests for the LSB channel and the payload cipher.

use neurostego_core::stego::{cipher, lsb};
use proptest::prelude::*;

const COVER_LEN: usize = 864;

fn cover(n: usize, phase: f32) -> Vec<f32> {
    (0..n).map(|i| (i as f32 * 0.61 + phase).sin() * 0.2).collect()
}

proptest! {
    #[test]
    fn lsb_recovers_payload_within_capacity(
        payload in proptest::collection::vec(any::<u8>(), 0..=lsb::capacity(COVER_LEN)),
        phase in 0.0f32..6.0,
    ) {
        let mut values = cover(COVER_LEN, phase);
        let report = lsb::embed(&mut values, &payload);
        prop_assert!(!report.truncated());

        let bytes = lsb::extract(&values, COVER_LEN);
        prop_assert_eq!(&bytes[..payload.len()], &payload[..]);
        prop_assert_eq!(&bytes[payload.len()..payload.len() + 2], &lsb::SENTINEL[..]);
    }

    #[test]
    fn sentinel_split_exact_without_ff_bytes(
        payload in proptest::collection::vec(0u8..0xFF, 0..=lsb::capacity(COVER_LEN)),
        phase in 0.0f32..6.0,
    ) {
        let mut values = cover(COVER_LEN, phase);
        lsb::embed(&mut values, &payload);

        let bytes = lsb::extract(&values, COVER_LEN);
        prop_assert_eq!(lsb::split_at_sentinel(&bytes).unwrap(), &payload[..]);
    }

    #[test]
    fn lsb_only_touches_bit_zero(
        payload in proptest::collection::vec(any::<u8>(), 0..200),
        phase in 0.0f32..6.0,
    ) {
        let original = cover(COVER_LEN, phase);
        let mut values = original.clone();
        lsb::embed(&mut values, &payload);
        for (a, b) in original.iter().zip(&values) {
            prop_assert_eq!(a.to_bits() & !1, b.to_bits() & !1);
        }
    }

    #[test]
    fn lsb_truncates_oversized_payload(
        payload in proptest::collection::vec(any::<u8>(), 120..300),
    ) {
        let mut values = cover(COVER_LEN, 0.0);
        let report = lsb::embed(&mut values, &payload);
        prop_assert!(report.truncated());
        prop_assert_eq!(report.embedded_bits, COVER_LEN);

        let bytes = lsb::extract(&values, COVER_LEN);
        prop_assert_eq!(&bytes[..], &payload[..COVER_LEN / 8]);
    }

    #[test]
    fn cipher_inverts_with_same_key(
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
        key in proptest::collection::vec(any::<u8>(), 1..40),
    ) {
        let encoded = cipher::encrypt(&plaintext, &key).unwrap();
        prop_assert_eq!(cipher::decrypt(&encoded, &key).unwrap(), plaintext);
    }

    #[test]
    fn xor_is_an_involution(
        data in proptest::collection::vec(any::<u8>(), 0..256),
        key in proptest::collection::vec(any::<u8>(), 1..40),
    ) {
        let once = cipher::xor_keystream(&data, &key).unwrap();
        prop_assert_eq!(once.len(), data.len());
        prop_assert_eq!(cipher::xor_keystream(&once, &key).unwrap(), data);
    }
}

#[test]
fn empty_key_rejected_both_ways() {
    assert!(cipher::encrypt(b"payload", &[]).is_err());
    assert!(cipher::decrypt("cGF5bG9hZA==", &[]).is_err());
}
