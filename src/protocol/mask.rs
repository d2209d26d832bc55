//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is an XOR with a 4-byte key cycled over the payload, so the same
//! function both masks and unmasks.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Masking that processes 4 bytes at a time using u32 operations.
///
/// Produces the same output as [`apply_mask`]; used on the decode path
/// where payloads can be large.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);

    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }

    // The tail starts on a multiple of 4, so the key restarts at index 0.
    apply_mask(chunks.into_remainder(), mask);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_rfc_example() {
        // RFC 6455 Section 5.7: masked "Hello"
        let mut data = [0x7f, 0x9f, 0x4d, 0x51, 0x58];
        apply_mask(&mut data, [0x37, 0xfa, 0x21, 0x3d]);
        assert_eq!(&data, b"Hello");
    }

    #[test]
    fn test_mask_is_involution() {
        let original: Vec<u8> = (0..=255).collect();
        let mask = [0xde, 0xad, 0xbe, 0xef];
        let mut data = original.clone();
        apply_mask(&mut data, mask);
        assert_ne!(data, original);
        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_fast_matches_scalar() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        for len in [0, 1, 3, 4, 5, 7, 8, 13, 64, 1001] {
            let original: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let mut scalar = original.clone();
            let mut fast = original.clone();
            apply_mask(&mut scalar, mask);
            apply_mask_fast(&mut fast, mask);
            assert_eq!(scalar, fast, "length {}", len);
        }
    }

    #[test]
    fn test_zero_mask_is_identity() {
        let mut data = b"unchanged".to_vec();
        apply_mask_fast(&mut data, [0, 0, 0, 0]);
        assert_eq!(data, b"unchanged");
    }
}
