//! Payload masking per RFC 6455 Section 5.3.
//!
//! Masking XORs each payload byte with one byte of a 4-byte key, cycling
//! through the key. The operation is its own inverse, so the same function
//! masks and unmasks.

/// Apply (or remove) a mask in place.
///
/// `data[i] ^= key[i % 4]`. Word-at-a-time over the aligned middle of the
/// buffer, byte-at-a-time at the edges.
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    let key_word = u32::from_ne_bytes(key);

    // Rotate the key so the word-sized pass stays in phase after the
    // unaligned prefix.
    let (prefix, words, suffix) = unsafe { data.align_to_mut::<u32>() };

    let mut offset = 0usize;
    for byte in prefix.iter_mut() {
        *byte ^= key[offset % 4];
        offset += 1;
    }

    let rotated = rotate_key(key_word, offset % 4);
    for word in words.iter_mut() {
        *word ^= rotated;
    }
    offset += words.len() * 4;

    for byte in suffix.iter_mut() {
        *byte ^= key[offset % 4];
        offset += 1;
    }
}

/// Rotate the native-endian key word left by `bytes` key positions.
#[inline]
fn rotate_key(key_word: u32, bytes: usize) -> u32 {
    let bits = (bytes as u32) * 8;
    if bits == 0 {
        key_word
    } else if cfg!(target_endian = "little") {
        key_word.rotate_right(bits)
    } else {
        key_word.rotate_left(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_mask_scalar(data: &mut [u8], key: [u8; 4]) {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    #[test]
    fn test_rfc_example_vector() {
        // Masked "Hello" with key 37 fa 21 3d, from RFC 6455 Section 5.7.
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = [0x7f, 0x9f, 0x4d, 0x51, 0x58];
        apply_mask(&mut data, key);
        assert_eq!(&data, b"Hello");
    }

    #[test]
    fn test_mask_is_self_inverse() {
        let key = [0xAA, 0x17, 0x03, 0xF2];
        let original: Vec<u8> = (0..=255u8).cycle().take(1031).collect();
        let mut data = original.clone();
        apply_mask(&mut data, key);
        assert_ne!(data, original);
        apply_mask(&mut data, key);
        assert_eq!(data, original);
    }

    #[test]
    fn test_word_path_matches_scalar() {
        let key = [0x01, 0x02, 0x03, 0x04];
        for len in 0..64 {
            let original: Vec<u8> = (0..len as u8).collect();
            let mut fast = original.clone();
            let mut slow = original.clone();
            apply_mask(&mut fast, key);
            apply_mask_scalar(&mut slow, key);
            assert_eq!(fast, slow, "mismatch at length {len}");
        }
    }

    #[test]
    fn test_unaligned_buffers() {
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let mut backing: Vec<u8> = (0..64u8).collect();
        let mut expected = backing.clone();
        // Offset the start so align_to sees varying prefixes.
        for start in 0..8 {
            apply_mask(&mut backing[start..], key);
            apply_mask_scalar(&mut expected[start..], key);
            assert_eq!(backing, expected, "mismatch at offset {start}");
        }
    }
}
