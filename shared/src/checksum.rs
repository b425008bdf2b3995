//! Rolling-sum checksum carried in the first four bytes of every game packet

/// Starting value of the rolling sum
pub const CHECKSUM_SEED: u32 = 0x0123_4567;

/// Number of leading bytes occupied by the checksum itself
pub const CHECKSUM_LEN: usize = 4;

/// Computes the rolling sum over everything after the checksum field
///
/// Byte `i` (for `i >= 4`) contributes `byte * (i - 3)`, accumulated with
/// wrapping 32-bit arithmetic on top of [`CHECKSUM_SEED`]. Packets of four
/// bytes or fewer hash to the seed.
pub fn checksum(packet: &[u8]) -> u32 {
    packet
        .iter()
        .enumerate()
        .skip(CHECKSUM_LEN)
        .fold(CHECKSUM_SEED, |sum, (i, &byte)| {
            sum.wrapping_add((byte as u32).wrapping_mul((i - 3) as u32))
        })
}

/// Writes the checksum of `packet` into its first four bytes
pub fn stamp_checksum(packet: &mut [u8]) {
    let sum = checksum(packet);
    packet[..CHECKSUM_LEN].copy_from_slice(&sum.to_le_bytes());
}

/// Reads the stored checksum and compares it with the recomputed sum
///
/// Returns `(stored, computed)` when they disagree.
pub fn verify_checksum(packet: &[u8]) -> Result<(), (u32, u32)> {
    if packet.len() < CHECKSUM_LEN {
        return Err((0, checksum(packet)));
    }

    let stored = u32::from_le_bytes([packet[0], packet[1], packet[2], packet[3]]);
    let computed = checksum(packet);

    if stored == computed {
        Ok(())
    } else {
        Err((stored, computed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_hashes_to_seed() {
        assert_eq!(checksum(&[]), CHECKSUM_SEED);
        assert_eq!(checksum(&[0xFF, 0xFF, 0xFF, 0xFF]), CHECKSUM_SEED);
    }

    #[test]
    fn test_weights_start_at_one() {
        // byte[4] weighs 1, byte[5] weighs 2
        let packet = [0, 0, 0, 0, 10, 3];
        assert_eq!(checksum(&packet), CHECKSUM_SEED + 10 + 6);
    }

    #[test]
    fn test_header_bytes_are_ignored() {
        let a = [1, 2, 3, 4, 12, 0, 7];
        let b = [9, 9, 9, 9, 12, 0, 7];
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn test_sum_wraps_instead_of_overflowing() {
        let packet = vec![0xFFu8; 70_000];
        // Must not panic in debug builds
        let _ = checksum(&packet);
    }

    #[test]
    fn test_stamp_then_verify() {
        let mut packet = [0u8, 0, 0, 0, 0, 0, 12, 0, 0, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD];
        assert!(verify_checksum(&packet).is_err());

        stamp_checksum(&mut packet);
        assert!(verify_checksum(&packet).is_ok());

        packet[10] = 1;
        let (stored, computed) = verify_checksum(&packet).unwrap_err();
        assert_ne!(stored, computed);
    }

    #[test]
    fn test_verify_rejects_short_input() {
        assert!(verify_checksum(&[1, 2]).is_err());
    }
}
