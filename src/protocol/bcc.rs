use crate::Error;

/// Block check character: XOR over every byte of `data`.
pub fn calculate_bcc(data: &[u8]) -> u8 {
    data.iter().fold(0, |bcc, b| bcc ^ b)
}

/// Compares the block check character of `data` with the one received.
pub fn verify_bcc(data: &[u8], received: u8) -> std::result::Result<(), Error> {
    let calculated = calculate_bcc(data);
    if calculated != received {
        return Err(Error::ChecksumMismatch {
            calculated,
            received,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_bcc() {
        assert_eq!(calculate_bcc(b"60010AFF(0000000000000000)\x03"), b't');
        assert_eq!(calculate_bcc(b"R1\x0260010AFF()\x03"), 0x15);
        assert_eq!(calculate_bcc(b""), 0);
    }

    #[test]
    fn test_verify_bcc() {
        assert!(verify_bcc(b"R1\x0260010AFF()\x03", 0x15).is_ok());
        assert_eq!(
            verify_bcc(b"R1\x0260010AFF()\x03", 0x16),
            Err(Error::ChecksumMismatch {
                calculated: 0x15,
                received: 0x16
            })
        );
    }

    #[test]
    fn test_single_bit_flip_is_detected() {
        let data = b"600100FF(60089784)\x03";
        let bcc = calculate_bcc(data);
        for i in 0..data.len() {
            for bit in 0..8 {
                let mut corrupted = data.to_vec();
                corrupted[i] ^= 1 << bit;
                assert!(verify_bcc(&corrupted, bcc).is_err());
            }
        }
    }
}
