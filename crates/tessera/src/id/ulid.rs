use core::{fmt, str::FromStr};

use crate::{
    DecodeError, ULID_TEXT_LEN, decode_crockford_u128, decode_crockford_u128_strict,
    encode_crockford_u128,
};

/// A 128-bit, time-ordered identifier stored as two 64-bit words.
///
/// ```text
///  Bit Index:  127            80 79           0
///              +----------------+-------------+
///  Field:      | timestamp (48) | random (80) |
///              +----------------+-------------+
///              |<-- MSB -- 128 bits -- LSB -->|
/// ```
///
/// Ordering is the unsigned numeric order of `(high, low)`, which is also the
/// lexicographic order of the 26-character text form.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ulid128 {
    high: u64,
    low: u64,
}

impl Ulid128 {
    pub const TIMESTAMP_BITS: u32 = 48;
    pub const RANDOM_BITS: u32 = 80;

    pub const TIMESTAMP_MASK: u64 = (1 << Self::TIMESTAMP_BITS) - 1;
    pub const RANDOM_MASK: u128 = (1 << Self::RANDOM_BITS) - 1;

    /// Width of the fixed `BINARY(16)` column form.
    pub const BINARY_LEN: usize = 16;

    pub const ZERO: Self = Self::from_parts(0, 0);
    pub const MAX: Self = Self::from_parts(u64::MAX, u64::MAX);

    pub const fn from_parts(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    pub const fn high(&self) -> u64 {
        self.high
    }

    pub const fn low(&self) -> u64 {
        self.low
    }

    pub const fn from_u128(value: u128) -> Self {
        Self::from_parts((value >> 64) as u64, value as u64)
    }

    pub const fn to_u128(self) -> u128 {
        ((self.high as u128) << 64) | self.low as u128
    }

    /// Packs a millisecond timestamp and random part. Extra bits in either
    /// argument are masked off.
    pub const fn from_components(timestamp_ms: u64, random: u128) -> Self {
        let ts = (timestamp_ms & Self::TIMESTAMP_MASK) as u128;
        Self::from_u128((ts << Self::RANDOM_BITS) | (random & Self::RANDOM_MASK))
    }

    /// Milliseconds since the Unix epoch.
    pub const fn timestamp_ms(&self) -> u64 {
        self.high >> (64 - Self::TIMESTAMP_BITS)
    }

    pub const fn random(&self) -> u128 {
        self.to_u128() & Self::RANDOM_MASK
    }

    pub const fn to_bytes(self) -> [u8; 16] {
        self.to_u128().to_be_bytes()
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self::from_u128(u128::from_be_bytes(bytes))
    }

    /// Reads a `BINARY(16)` column value. Any other width is rejected rather
    /// than padded or truncated.
    pub fn from_binary_column(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| DecodeError::InvalidLength {
            expected: Self::BINARY_LEN,
            got: bytes.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Reads a `CHAR(26)` column value, which must be in canonical form.
    ///
    /// Unlike [`FromStr`], lower case and the Crockford aliases are rejected.
    pub fn from_char_column(text: &str) -> Result<Self, DecodeError> {
        decode_crockford_u128_strict(text).map(Self::from_u128)
    }

    /// The canonical 26-character Crockford base32 text, as ASCII bytes.
    pub fn encode(&self) -> [u8; ULID_TEXT_LEN] {
        encode_crockford_u128(self.to_u128())
    }
}

impl fmt::Display for Ulid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buf = self.encode();
        // The alphabet is ASCII.
        f.write_str(core::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for Ulid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ulid128")
            .field("text", &format_args!("{self}"))
            .field("timestamp_ms", &self.timestamp_ms())
            .field("random", &format_args!("{:#022x}", self.random()))
            .finish()
    }
}

impl FromStr for Ulid128 {
    type Err = DecodeError;

    /// Parses 26 Crockford characters. Lower case and the `O`/`I`/`L`
    /// aliases are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_crockford_u128(s).map(Self::from_u128)
    }
}

impl TryFrom<&str> for Ulid128 {
    type Error = DecodeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<u128> for Ulid128 {
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}

impl From<Ulid128> for u128 {
    fn from(id: Ulid128) -> Self {
        id.to_u128()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_and_u128_agree() {
        let id = Ulid128::from_parts(0x0123_4567_89AB_CDEF, 0xFEDC_BA98_7654_3210);
        assert_eq!(id.to_u128(), 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210);
        assert_eq!(Ulid128::from_u128(id.to_u128()), id);
        assert_eq!(Ulid128::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn components_are_masked_and_extracted() {
        let id = Ulid128::from_components(1_700_000_000_000, u128::MAX);
        assert_eq!(id.timestamp_ms(), 1_700_000_000_000);
        assert_eq!(id.random(), Ulid128::RANDOM_MASK);

        let ts_overflow = Ulid128::from_components(u64::MAX, 0);
        assert_eq!(ts_overflow.timestamp_ms(), Ulid128::TIMESTAMP_MASK);
    }

    #[test]
    fn order_follows_high_then_low() {
        let a = Ulid128::from_parts(1, u64::MAX);
        let b = Ulid128::from_parts(2, 0);
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
        assert!(a.to_u128() < b.to_u128());
    }

    #[test]
    fn display_and_parse_round_trip() {
        let id = Ulid128::from_components(1_700_000_000_000, 0xABCDEF);
        let text = id.to_string();
        assert_eq!(text.len(), 26);
        assert_eq!(text.parse::<Ulid128>().unwrap(), id);
        assert_eq!(text.to_lowercase().parse::<Ulid128>().unwrap(), id);
    }

    #[test]
    fn binary_column_rejects_wrong_width() {
        let id = Ulid128::from_u128(42);
        assert_eq!(Ulid128::from_binary_column(&id.to_bytes()).unwrap(), id);
        assert_eq!(
            Ulid128::from_binary_column(&[0u8; 15]),
            Err(DecodeError::InvalidLength {
                expected: 16,
                got: 15
            })
        );
        assert!(Ulid128::from_binary_column(&[0u8; 17]).is_err());
    }

    #[test]
    fn char_column_rejects_wrong_width() {
        let id = Ulid128::from_u128(42);
        let text = id.to_string();
        assert_eq!(Ulid128::from_char_column(&text).unwrap(), id);
        assert!(Ulid128::from_char_column(&text[1..]).is_err());
        assert!(Ulid128::from_char_column(&format!("{text} ")).is_err());
    }

    #[test]
    fn char_column_only_accepts_canonical_text() {
        let text = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
        let id: Ulid128 = text.parse().unwrap();
        assert_eq!(Ulid128::from_char_column(text).unwrap(), id);

        let lower = text.to_lowercase();
        assert_eq!(lower.parse::<Ulid128>().unwrap(), id);
        assert_eq!(
            Ulid128::from_char_column(&lower),
            Err(DecodeError::InvalidAscii {
                byte: b'a',
                index: 2
            })
        );

        // `O` and `I` are aliases for `0` and `1`.
        let aliased = "OIARZ3NDEKTSV4RRFFQ69G5FAV";
        assert_eq!(aliased.parse::<Ulid128>().unwrap(), id);
        assert!(matches!(
            Ulid128::from_char_column(aliased),
            Err(DecodeError::InvalidAscii { byte: b'O', index: 0 })
        ));
    }
}
