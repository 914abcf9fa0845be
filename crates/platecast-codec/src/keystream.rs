//! Per-layer XOR keystream (spec.md §4.3.1, C3).
//!
//! Each layer is XOR'd against a keystream seeded from the file's global
//! `xor_key` and the layer's own index. The stream is an involution: decoding
//! and encoding are the same operation, applied in place.

/// Derives the keystream's initial state for a given global key.
fn init_state(global_key: u32) -> u32 {
    global_key
        .wrapping_mul(0x2d83_cdac)
        .wrapping_add(0xd8a8_3423)
}

/// Decrypts (or, equivalently, encrypts) `data` in place using the keystream
/// for layer `layer_index` under the file's global `xor_key`.
pub fn apply_keystream(data: &mut [u8], global_key: u32, layer_index: u32) {
    if global_key == 0 {
        return;
    }
    let init = init_state(global_key);
    let mut key = layer_index
        .wrapping_mul(0x1e15_30cd)
        .wrapping_add(0xec3d_47cd)
        .wrapping_mul(init);

    for (j, byte) in data.iter_mut().enumerate() {
        let shift = 8 * (j % 4);
        *byte ^= ((key >> shift) & 0xFF) as u8;
        if j % 4 == 3 {
            key = key.wrapping_add(init);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_is_involution() {
        let original = vec![1, 2, 3, 4, 5, 6, 7, 8, 9];
        let mut buf = original.clone();
        apply_keystream(&mut buf, 0xDEADBEEF, 3);
        assert_ne!(buf, original);
        apply_keystream(&mut buf, 0xDEADBEEF, 3);
        assert_eq!(buf, original);
    }

    #[test]
    fn zero_key_is_a_no_op() {
        let original = vec![1, 2, 3, 4];
        let mut buf = original.clone();
        apply_keystream(&mut buf, 0, 0);
        assert_eq!(buf, original);
    }

    #[test]
    fn different_layer_indices_produce_different_streams() {
        let data = vec![0u8; 16];
        let mut a = data.clone();
        let mut b = data.clone();
        apply_keystream(&mut a, 0x1234_5678, 0);
        apply_keystream(&mut b, 0x1234_5678, 1);
        assert_ne!(a, b);
    }
}
