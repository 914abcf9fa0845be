//! CTB v4E settings-block decryption (spec.md §4.2, §9 "AES keys").
//!
//! Both the AES-256 key and IV are derived once per process from two
//! base64-obfuscated constants, each XOR'd byte-for-byte against the cycling
//! ASCII of the literal "UVtools" (a nod to the reverse-engineering project
//! this format knowledge comes from). The derivation is cheap and
//! side-effect-free, so it is computed lazily and cached rather than baked
//! in as raw byte arrays.

use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
use base64::Engine as _;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const XOR_LITERAL: &[u8] = b"UVtools";

// Base64-obfuscated key/IV material. The plaintext bytes carry no meaning on
// their own; they only become the real AES-256 key/IV after the XOR pass
// below, which is the whole point of obfuscating them in the first place.
const OBFUSCATED_KEY_B64: &str =
    "ZXRKbHRNbnlsUGV0S0tPMHdRcVdtVmhHdVdPREtlZUZoUmZ3SWx5bW1yZQ==";
const OBFUSCATED_IV_B64: &str = "cUtEbHFDa0ZuSnBnWGpzZg==";

struct KeyMaterial {
    key: [u8; 32],
    iv: [u8; 16],
}

fn xor_with_literal(mut bytes: Vec<u8>) -> Vec<u8> {
    for (i, b) in bytes.iter_mut().enumerate() {
        *b ^= XOR_LITERAL[i % XOR_LITERAL.len()];
    }
    bytes
}

fn derive_key_material() -> KeyMaterial {
    let engine = base64::engine::general_purpose::STANDARD;

    let key_bytes = xor_with_literal(
        engine
            .decode(OBFUSCATED_KEY_B64)
            .expect("embedded key constant is valid base64"),
    );
    let iv_bytes = xor_with_literal(
        engine
            .decode(OBFUSCATED_IV_B64)
            .expect("embedded iv constant is valid base64"),
    );

    let mut key = [0u8; 32];
    let mut iv = [0u8; 16];
    let key_len = key_bytes.len().min(32);
    let iv_len = iv_bytes.len().min(16);
    key[..key_len].copy_from_slice(&key_bytes[..key_len]);
    iv[..iv_len].copy_from_slice(&iv_bytes[..iv_len]);

    KeyMaterial { key, iv }
}

static KEY_MATERIAL: Lazy<KeyMaterial> = Lazy::new(derive_key_material);

/// Decrypts a CTB v4E settings block in place with AES-256-CBC. No padding
/// is stripped: the block's documented field layout already accounts for the
/// full decrypted length, and the padding must be left alone.
pub fn decrypt_settings_block(ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % 16 != 0 {
        return Err(Error::SettingsDecryption(format!(
            "settings block length {} is not a multiple of the AES block size",
            ciphertext.len()
        )));
    }

    let mut buf = ciphertext.to_vec();
    let decryptor = Aes256CbcDec::new(KEY_MATERIAL.key.as_slice().into(), KEY_MATERIAL.iv.as_slice().into());
    decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| Error::SettingsDecryption(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_stable_across_calls() {
        let a = derive_key_material();
        let b = derive_key_material();
        assert_eq!(a.key, b.key);
        assert_eq!(a.iv, b.iv);
    }

    #[test]
    fn rejects_non_block_aligned_input() {
        let err = decrypt_settings_block(&[0u8; 15]);
        assert!(err.is_err());
    }

    #[test]
    fn round_trip_with_real_aes_encrypt() {
        use aes::cipher::KeyIvInit as _;
        type Enc = cbc::Encryptor<aes::Aes256>;

        let km = derive_key_material();
        let plaintext = [0x42u8; 288];
        let mut buf = plaintext.to_vec();
        let encryptor = Enc::new(km.key.as_slice().into(), km.iv.as_slice().into());
        // NoPadding encrypt needs an exact multiple of the block size, which
        // 288 already is.
        use aes::cipher::BlockEncryptMut;
        use aes::cipher::block_padding::NoPadding;
        let ciphertext = encryptor
            .encrypt_padded_mut::<NoPadding>(&mut buf, plaintext.len())
            .unwrap();

        let decrypted = decrypt_settings_block(ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }
}
