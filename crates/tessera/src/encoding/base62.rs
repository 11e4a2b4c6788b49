use crate::DecodeError;

/// Base62 alphabet: digits, then upper case, then lower case.
pub const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Fixed width of a 128-bit value, since `62^22 > 2^128 > 62^21`.
pub const BASE62_TEXT_LEN: usize = 22;

const NO_VALUE: u8 = 255;

const LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0_u8;
    while i < 62 {
        lut[BASE62_ALPHABET[i as usize] as usize] = i;
        i += 1;
    }
    lut
};

/// Encodes a 128-bit value as exactly 22 base62 characters, left-padded with
/// `0`.
#[inline]
pub fn encode_base62_u128(mut value: u128) -> [u8; BASE62_TEXT_LEN] {
    let mut buf = [b'0'; BASE62_TEXT_LEN];
    for slot in buf.iter_mut().rev() {
        *slot = BASE62_ALPHABET[(value % 62) as usize];
        value /= 62;
        if value == 0 {
            break;
        }
    }
    buf
}

/// Decodes exactly 22 base62 characters.
///
/// Values above `u128::MAX` (possible since `62^22` exceeds `2^128`) are
/// rejected with [`DecodeError::Overflow`].
pub fn decode_base62_u128(encoded: &str) -> Result<u128, DecodeError> {
    let bytes = encoded.as_bytes();
    if bytes.len() != BASE62_TEXT_LEN {
        return Err(DecodeError::InvalidLength {
            expected: BASE62_TEXT_LEN,
            got: bytes.len(),
        });
    }
    let mut acc = 0u128;
    for (index, &byte) in bytes.iter().enumerate() {
        let val = LOOKUP[usize::from(byte)];
        if val == NO_VALUE {
            return Err(DecodeError::InvalidAscii { byte, index });
        }
        acc = acc
            .checked_mul(62)
            .and_then(|acc| acc.checked_add(u128::from(val)))
            .ok_or(DecodeError::Overflow)?;
    }
    Ok(acc)
}
