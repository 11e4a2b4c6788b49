use crate::DecodeError;

/// Crockford base32 alphabet, in ascending value order.
pub const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Number of characters needed for a 128-bit value.
pub const ULID_TEXT_LEN: usize = 26;

const NO_VALUE: u8 = 255;
const BITS_PER_CHAR: usize = 5;

/// Canonical-only lookup: upper-case alphabet, no aliases.
const STRICT_LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0_u8;
    while i < 32 {
        lut[CROCKFORD_ALPHABET[i as usize] as usize] = i;
        i += 1;
    }
    lut
};

/// Lenient lookup: lower case plus the `O`/`I`/`L` aliases.
const LENIENT_LOOKUP: [u8; 256] = {
    let mut lut = STRICT_LOOKUP;
    let mut i = 0_u8;
    while i < 32 {
        let c = CROCKFORD_ALPHABET[i as usize];
        if c.is_ascii_uppercase() {
            lut[(c + 32) as usize] = i;
        }
        i += 1;
    }
    lut[b'O' as usize] = 0;
    lut[b'o' as usize] = 0;
    lut[b'I' as usize] = 1;
    lut[b'i' as usize] = 1;
    lut[b'L' as usize] = 1;
    lut[b'l' as usize] = 1;
    lut
};

/// Encodes a 128-bit value as 26 Crockford base32 characters.
///
/// The top character carries only 3 bits, so it is always in `0..=7`, and the
/// text sorts the same way as the number.
#[inline]
pub fn encode_crockford_u128(value: u128) -> [u8; ULID_TEXT_LEN] {
    let mut buf = [0u8; ULID_TEXT_LEN];
    for (i, slot) in buf.iter_mut().rev().enumerate() {
        let idx = (value >> (i * BITS_PER_CHAR)) & 0x1F;
        *slot = CROCKFORD_ALPHABET[idx as usize];
    }
    buf
}

/// Encodes the low 10 bits of `value` as two characters.
#[inline]
pub fn encode_crockford_pair(value: u16) -> [u8; 2] {
    [
        CROCKFORD_ALPHABET[usize::from((value >> 5) & 0x1F)],
        CROCKFORD_ALPHABET[usize::from(value & 0x1F)],
    ]
}

/// Decodes exactly 26 canonical characters.
///
/// Rejects lower case, the Crockford aliases and a leading character above
/// `7` (which would overflow 128 bits).
pub fn decode_crockford_u128_strict(encoded: &str) -> Result<u128, DecodeError> {
    decode_u128(encoded, &STRICT_LOOKUP)
}

/// Decodes exactly 26 characters, accepting lower case and aliases.
pub fn decode_crockford_u128(encoded: &str) -> Result<u128, DecodeError> {
    decode_u128(encoded, &LENIENT_LOOKUP)
}

#[inline]
fn decode_u128(encoded: &str, lookup: &[u8; 256]) -> Result<u128, DecodeError> {
    let bytes = encoded.as_bytes();
    if bytes.len() != ULID_TEXT_LEN {
        return Err(DecodeError::InvalidLength {
            expected: ULID_TEXT_LEN,
            got: bytes.len(),
        });
    }
    let mut acc = 0u128;
    for (index, &byte) in bytes.iter().enumerate() {
        let val = lookup[usize::from(byte)];
        if val == NO_VALUE {
            return Err(DecodeError::InvalidAscii { byte, index });
        }
        if index == 0 && val > 7 {
            return Err(DecodeError::Overflow);
        }
        acc = (acc << BITS_PER_CHAR) | u128::from(val);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(val: u128) {
        let buf = encode_crockford_u128(val);
        let s = core::str::from_utf8(&buf).unwrap();
        assert_eq!(decode_crockford_u128_strict(s).unwrap(), val, "b32={s}");
    }

    #[test]
    fn encode_decode_preserves_u128_values() {
        for &v in &[
            0,
            1,
            u128::MAX,
            42,
            0xFFFF_0000_FFFF_0000_FFFF_0000_FFFF_0000,
            0x0123_4567_89AB_CDEF_0123_4567_89AB_CDEF,
        ] {
            roundtrip(v);
        }
    }

    #[test]
    fn encoding_preserves_order() {
        let a = encode_crockford_u128(0x0000_0001_0000_0000_0000_0000_0000_0000);
        let b = encode_crockford_u128(0x0000_0001_0000_0000_0000_0000_0000_0001);
        let c = encode_crockford_u128(u128::MAX);
        assert!(a < b && b < c);
        assert_eq!(&c, b"7ZZZZZZZZZZZZZZZZZZZZZZZZZ");
    }

    #[test]
    fn strict_decode_rejects_lowercase_and_aliases() {
        let lower = "0000000000000000000000001a";
        assert_eq!(
            decode_crockford_u128_strict(lower),
            Err(DecodeError::InvalidAscii {
                byte: b'a',
                index: 25
            })
        );
        assert_eq!(decode_crockford_u128(lower).unwrap(), 42);

        let alias = "000000000000000000000000O1";
        assert!(decode_crockford_u128_strict(alias).is_err());
        assert_eq!(decode_crockford_u128(alias).unwrap(), 1);
    }

    #[test]
    fn decode_rejects_overflowing_first_char() {
        assert_eq!(
            decode_crockford_u128("8ZZZZZZZZZZZZZZZZZZZZZZZZZ"),
            Err(DecodeError::Overflow)
        );
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(
            decode_crockford_u128_strict("0123"),
            Err(DecodeError::InvalidLength {
                expected: 26,
                got: 4
            })
        );
    }

    #[test]
    fn decode_returns_error_for_invalid_character() {
        assert_eq!(
            decode_crockford_u128("0000000000000000000000000!"),
            Err(DecodeError::InvalidAscii {
                byte: b'!',
                index: 25
            })
        );
    }

    #[test]
    fn pair_encodes_ten_bits() {
        assert_eq!(&encode_crockford_pair(0), b"00");
        assert_eq!(&encode_crockford_pair(0xFF), b"7Z");
        assert_eq!(&encode_crockford_pair(33), b"11");
    }
}
