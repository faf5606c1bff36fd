// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Repeating-key XOR with base64 transport framing.
//!
//! `encrypt` XORs byte `i` of the plaintext with `key[i % key.len()]` and
//! base64-encodes (standard alphabet, padded). `decrypt` reverses both steps.
//! XOR is self-inverse, so both directions share [`xor_keystream`].
//!
//! This is obfuscation, not confidentiality: the key is short, repeats, and
//! is recoverable from any known plaintext.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::stego::error::StegoError;

/// XOR `data` with the cyclic `key`. Rejects an empty key.
pub fn xor_keystream(data: &[u8], key: &[u8]) -> Result<Vec<u8>, StegoError> {
    if key.is_empty() {
        return Err(StegoError::EmptyKey);
    }
    Ok(data
        .iter()
        .zip(key.iter().cycle())
        .map(|(&d, &k)| d ^ k)
        .collect())
}

/// XOR-encrypt and base64-encode.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String, StegoError> {
    let ciphertext = xor_keystream(plaintext, key)?;
    Ok(STANDARD.encode(ciphertext))
}

/// base64-decode and XOR-decrypt.
///
/// The key is checked before the input is decoded, so an empty key is
/// reported even for malformed input. Surrounding whitespace is malformed.
pub fn decrypt(encoded: &str, key: &[u8]) -> Result<Vec<u8>, StegoError> {
    if key.is_empty() {
        return Err(StegoError::EmptyKey);
    }
    let ciphertext = STANDARD
        .decode(encoded)
        .map_err(|_| StegoError::InvalidBase64)?;
    xor_keystream(&ciphertext, key)
}

/// [`decrypt`] and require the plaintext to be UTF-8.
pub fn decrypt_to_string(encoded: &str, key: &[u8]) -> Result<String, StegoError> {
    let plaintext = decrypt(encoded, key)?;
    String::from_utf8(plaintext).map_err(|_| StegoError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_roundtrip_with_trigger_key() {
        let ct = encrypt(b"FLAG{test}", b"AlexNeuralKey3").unwrap();
        assert_eq!(decrypt(&ct, b"AlexNeuralKey3").unwrap(), b"FLAG{test}");
        assert_eq!(decrypt_to_string(&ct, b"AlexNeuralKey3").unwrap(), "FLAG{test}");
    }

    #[test]
    fn wrong_key_gives_wrong_plaintext() {
        let ct = encrypt(b"FLAG{test}", b"AlexNeuralKey3").unwrap();
        let wrong = decrypt(&ct, b"AlexNeuralKey1").unwrap();
        assert_ne!(wrong, b"FLAG{test}");
    }

    #[test]
    fn known_ciphertext() {
        // "AB" ^ [0x01] = [0x40, 0x43] -> "QEM="
        assert_eq!(encrypt(b"AB", &[0x01]).unwrap(), "QEM=");
    }

    #[test]
    fn key_cycles() {
        let out = xor_keystream(&[0, 0, 0, 0, 0], &[1, 2]).unwrap();
        assert_eq!(out, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn empty_key_rejected() {
        assert_eq!(encrypt(b"data", b""), Err(StegoError::EmptyKey));
        assert_eq!(decrypt("ZGF0YQ==", b""), Err(StegoError::EmptyKey));
        assert_eq!(decrypt("!!!", b""), Err(StegoError::EmptyKey));
    }

    #[test]
    fn malformed_base64_rejected() {
        assert_eq!(decrypt("not base64!", b"k"), Err(StegoError::InvalidBase64));
        assert_eq!(decrypt("abc", b"k"), Err(StegoError::InvalidBase64));
    }

    #[test]
    fn whitespace_around_base64_rejected() {
        assert_eq!(decrypt(" QEM=\n", &[0x01]), Err(StegoError::InvalidBase64));
        assert_eq!(decrypt("QEM=", &[0x01]).unwrap(), b"AB");
    }

    #[test]
    fn empty_plaintext() {
        let ct = encrypt(b"", b"key").unwrap();
        assert_eq!(ct, "");
        assert_eq!(decrypt(&ct, b"key").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn non_utf8_plaintext_reported() {
        let ct = encrypt(&[0xC3, 0x28], b"k").unwrap();
        assert_eq!(decrypt_to_string(&ct, b"k"), Err(StegoError::InvalidUtf8));
    }
}
